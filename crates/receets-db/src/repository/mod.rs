//! # Repository Module
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  PosEngine                                                             │
//! │       │  db.sales().save(&mut sale)                                    │
//! │       ▼                                                                 │
//! │  SaleRepository                                                        │
//! │  ├── insert(&self, sale)                                               │
//! │  ├── get_by_id(&self, id)                                              │
//! │  ├── save(&self, &mut sale)         ← version check + child rewrite    │
//! │  ├── save_many(&self, &mut [sale])  ← one transaction                  │
//! │  └── list(&self, filter, page)                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`sale::SaleRepository`] - Sales with their line items and payments
//! - [`merchant::MerchantRepository`] - Merchants and their locations
//! - [`customer::CustomerRepository`] - Customers and cached gateway profiles

pub mod customer;
pub mod merchant;
pub mod sale;

#[cfg(test)]
pub(crate) mod fixtures;
