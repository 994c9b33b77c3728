pub mod config;
pub mod error;
pub mod portal;
pub mod types;

pub use config::{InjectedEnvironment, PortalConfig, RuntimeConfig};
pub use error::{PortalError, Result};
pub use portal::{Carousel, CarouselSlide, DepartmentProfile, Icon, SiteBrand, SITE_BRAND};
pub use types::*;
