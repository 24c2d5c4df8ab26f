// DANS : src/monitoring/logging.rs
use anyhow::{Context, Result, anyhow};
use chrono::{Local, NaiveDate};
use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Installe le subscriber `tracing` global.
/// Sans `log_dir`, les logs partent sur la sortie standard ; sinon ils sont
/// ajoutés au fichier du jour `<log_dir>/sol-listener/get_new_pool_<date>.log`.
pub fn setup_logging(log_dir: Option<&Path>) -> Result<()> {
    // On crée un filtre qui lit la variable RUST_LOG.
    // S'il n'est pas défini, il utilisera "info" par défaut.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true);

    match log_dir {
        Some(dir) => {
            let path = log_file_path(dir, Local::now().date_naive());
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Impossible de créer le dossier de logs {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Impossible d'ouvrir le fichier de logs {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| anyhow!("Installation du logger échouée : {}", e))
        }
        None => builder
            .try_init()
            .map_err(|e| anyhow!("Installation du logger échouée : {}", e)),
    }
}

pub fn log_file_path(dir: &Path, day: NaiveDate) -> PathBuf {
    dir.join("sol-listener")
        .join(format!("get_new_pool_{}.log", day.format("%Y-%m-%d")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_is_named_after_the_day() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let path = log_file_path(Path::new("/var/log"), day);
        assert_eq!(path, PathBuf::from("/var/log/sol-listener/get_new_pool_2024-03-09.log"));
    }
}
