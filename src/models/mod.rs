pub mod item;
pub mod product;

pub use item::Item;
pub use product::{NewProduct, Product, ProductChanges};
