//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module     | Commands handled                         |
//! |------------|------------------------------------------|
//! | `create`   | `Create`, `Plan`                         |
//! | `apps`     | `List`, `Show`, `Revise`, `Remove`       |
//! | `fetch`    | `Fetch`                                  |
//! | `settings` | `Settings`                               |
//! | `cleanup`  | `Cleanup`                                |
//! | `config`   | `Config`                                 |

pub mod apps;
pub mod cleanup;
pub mod config;
pub mod create;
pub mod fetch;
pub mod settings;

pub use apps::{cmd_list, cmd_remove, cmd_revise, cmd_show};
pub use cleanup::cmd_cleanup;
pub use config::cmd_config;
pub use create::{cmd_create, cmd_plan};
pub use fetch::cmd_fetch;
pub use settings::cmd_settings;

use anyhow::{Context, Result};
use sitewright::config::SiteConfig;
use sitewright::store::LocalStore;

/// Open the store under the configured data directory.
pub(crate) fn open_store(config: &SiteConfig) -> Result<LocalStore> {
    LocalStore::open(config.data_dir.clone()).with_context(|| {
        format!(
            "Failed to open data directory {}",
            config.data_dir.display()
        )
    })
}
