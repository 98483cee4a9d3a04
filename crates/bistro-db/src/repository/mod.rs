//! # Repositories
//!
//! Each repository owns a clone of the pool and the SQL for one group of
//! tables. [`Database`](crate::Database) hands them out:
//!
//! ```rust,ignore
//! let sale = db.sales().create(&new_sale).await?;
//! db.sales().insert_items(&sale.id, &lines).await?;   // stock-checked, all or nothing
//! ```
//!
//! | Repository            | Tables / views                                   |
//! |-----------------------|--------------------------------------------------|
//! | [`ProductRepository`] | `products` (archive or hard delete)              |
//! | [`DishRepository`]    | `dishes`, `dish_ingredients`                     |
//! | [`SaleRepository`]    | `sales`, `sale_items`, `stock_consumptions`     |
//! | [`StockRepository`]   | `v_current_stock`, `purchases`, `stock_adjustments` |
//! | [`MemberRepository`]  | `restaurants`, `restaurant_members`              |

pub mod dish;
pub mod member;
pub mod product;
pub mod sale;
pub mod stock;

pub use dish::DishRepository;
pub use member::MemberRepository;
pub use product::ProductRepository;
pub use sale::SaleRepository;
pub use stock::StockRepository;
