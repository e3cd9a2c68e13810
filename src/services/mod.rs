pub mod item_service;
pub mod product_service;

pub use item_service::ItemService;
pub use product_service::{ProductPage, ProductService, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, SYSTEM_ACTOR};
