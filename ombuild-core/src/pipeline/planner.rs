use std::collections::HashSet;
use std::path::Path;

use ombuild_common::config::Config;
use ombuild_common::error::Result;
use ombuild_common::pipeline::{BuildRequest, ScopeLayout, Tag};
use tracing::{debug, warn};

/// One request per input tag, in input order, installing into
/// `<prefix_root>/<tag>` from its own temporary working scope.
///
/// A repeated tag still gets its own pipeline; the pipelines share the
/// install prefix, so a warning is logged.
pub fn plan_requests(tags: &[Tag], config: &Config) -> Result<Vec<BuildRequest>> {
    let mut seen = HashSet::new();
    let mut requests = Vec::with_capacity(tags.len());
    for tag in tags {
        if !seen.insert(tag) {
            warn!(
                "[{}] Requested more than once; the pipelines install into the same prefix",
                tag
            );
        }
        let install_prefix = config.install_prefix(tag);
        debug!("[{}] Planned install into {}", tag, install_prefix.display());
        requests.push(BuildRequest {
            tag: tag.clone(),
            install_prefix,
            layout: ScopeLayout::Temporary {
                parent: config.work_dir.clone(),
            },
        });
    }
    Ok(requests)
}

/// Single-tag request with fixed paths under `base`: source in `src/<tag>`,
/// build metadata in `build/<tag>`, install into `<tag>`.
pub fn plan_in_tree(tag: Tag, base: &Path) -> BuildRequest {
    BuildRequest {
        install_prefix: base.join(tag.as_str()),
        layout: ScopeLayout::InTree {
            base: base.to_path_buf(),
        },
        tag,
    }
}
