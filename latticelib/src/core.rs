pub mod config;
pub mod data;
pub mod frontmatter;
pub mod site;
pub mod sitemap;
pub mod source;

pub use config::{LayoutSetting, Mode, SiteConfig, SitePaths};
pub use data::DataStore;
pub use site::{Extensions, Logger, Site};
pub use sitemap::{Resource, Sitemap};
pub use source::SourceFile;
