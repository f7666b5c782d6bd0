//! # smallspider-blog
//!
//! The blog app: [`Post`](models::Post), [`Category`](models::Category) and
//! [`Tag`](models::Tag), registered on the `cus_admin` site by
//! [`custom_site`](site::custom_site).
//!
//! Every save through the admin stamps the requesting user as the record's
//! owner, and posts are only ever shown to their owner.

pub mod admin;
pub mod models;
pub mod site;

pub use site::{bootstrap, custom_site};
