//! Per-kind container definitions
//!
//! Used when a service folder does not bring its own Dockerfile.

use std::io;
use std::path::Path;

use strata_core::domain::service::ServiceKind;
use tracing::info;

const API: &str = include_str!("../templates/api.Dockerfile");
const FRONTEND: &str = include_str!("../templates/frontend.Dockerfile");
const WORKER: &str = include_str!("../templates/worker.Dockerfile");
const DATABASE: &str = include_str!("../templates/database.Dockerfile");

pub fn dockerfile_for(kind: ServiceKind) -> &'static str {
    match kind {
        ServiceKind::Api => API,
        ServiceKind::Frontend => FRONTEND,
        ServiceKind::Worker => WORKER,
        ServiceKind::Database => DATABASE,
    }
}

/// Write the kind's Dockerfile into `folder` unless one exists
///
/// Returns `true` when a file was written.
pub fn ensure_dockerfile(folder: &Path, kind: ServiceKind) -> io::Result<bool> {
    let path = folder.join("Dockerfile");
    if path.exists() {
        return Ok(false);
    }

    std::fs::write(&path, dockerfile_for(kind))?;
    info!("Generated {} Dockerfile at {}", kind, path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_expose_default_ports() {
        for kind in ServiceKind::ALL {
            let expose = format!("EXPOSE {}", kind.default_port());
            assert!(
                dockerfile_for(kind).contains(&expose),
                "{kind} template should expose {}",
                kind.default_port()
            );
        }
    }

    #[test]
    fn test_ensure_dockerfile_writes_once() {
        let dir = tempfile::tempdir().unwrap();

        assert!(ensure_dockerfile(dir.path(), ServiceKind::Frontend).unwrap());
        let written = std::fs::read_to_string(dir.path().join("Dockerfile")).unwrap();
        assert!(written.starts_with("FROM nginx"));

        assert!(!ensure_dockerfile(dir.path(), ServiceKind::Api).unwrap());
        let kept = std::fs::read_to_string(dir.path().join("Dockerfile")).unwrap();
        assert_eq!(kept, written);
    }

    #[test]
    fn test_existing_dockerfile_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Dockerfile"), "FROM scratch\n").unwrap();

        assert!(!ensure_dockerfile(dir.path(), ServiceKind::Worker).unwrap());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("Dockerfile")).unwrap(),
            "FROM scratch\n"
        );
    }
}
