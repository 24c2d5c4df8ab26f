// DANS : src/output/audit.rs

use super::OutputRecord;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use fs2::FileExt;
use std::{
    ffi::OsString,
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};
use tracing::{info, warn};

/// Les deux flux d'audit : tokens passés par les portes marché, et tokens signalés.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStream {
    Unfiltered,
    Filtered,
}

impl AuditStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStream::Unfiltered => "unfiltered",
            AuditStream::Filtered => "filtered",
        }
    }
}

/// Fichiers CSV journaliers, un par flux.
#[derive(Debug, Clone)]
pub struct AuditLog {
    unfiltered_dir: PathBuf,
    filtered_dir: PathBuf,
}

impl AuditLog {
    pub fn new(unfiltered_dir: PathBuf, filtered_dir: PathBuf) -> Self {
        Self { unfiltered_dir, filtered_dir }
    }

    pub fn path_for(&self, stream: AuditStream, date: NaiveDate) -> PathBuf {
        let dir = match stream {
            AuditStream::Unfiltered => &self.unfiltered_dir,
            AuditStream::Filtered => &self.filtered_dir,
        };
        dir.join(format!("token_addresses_{}_{}.csv", stream.as_str(), date.format("%Y-%m-%d")))
    }

    /// Ajoute l'enregistrement au fichier du jour de son horodatage.
    pub async fn append(&self, stream: AuditStream, record: &OutputRecord) -> Result<PathBuf> {
        let path = self.path_for(stream, record.timestamp.date_naive());
        let owned = record.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || persist(&owned, &target))
            .await
            .context("Tâche d'écriture CSV interrompue")??;
        info!(
            token = %record.address,
            stream = stream.as_str(),
            file = %path.display(),
            "[Audit] Enregistrement ajouté."
        );
        Ok(path)
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(".lock");
    PathBuf::from(os)
}

/// Ajoute une ligne au CSV, en-tête compris si le fichier est vide.
/// Un verrou exclusif sur `<fichier>.lock` empêche deux écrivains
/// (tâches ou processus) d'entrelacer leurs lignes.
pub fn persist(record: &OutputRecord, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Création du dossier {} échouée", parent.display()))?;
    }

    let lock_path = lock_path(path);
    let lock_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&lock_path)
        .with_context(|| format!("Ouverture du verrou {} échouée", lock_path.display()))?;
    FileExt::lock_exclusive(&lock_file)
        .with_context(|| format!("Verrouillage de {} échoué", lock_path.display()))?;

    let result = append_row(record, path);
    release(&lock_file, &lock_path);
    result
}

/// L'échec du déverrouillage est seulement journalisé, l'appelant reçoit
/// le résultat de l'écriture.
fn release(lock_file: &fs::File, lock_path: &Path) {
    if let Err(e) = FileExt::unlock(lock_file) {
        warn!(lock = %lock_path.display(), error = %e, "[Audit] Déverrouillage échoué.");
    }
}

fn append_row(record: &OutputRecord, path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Ouverture de {} échouée", path.display()))?;
    let is_new = file.metadata()?.len() == 0;

    let columns = record.columns();
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    if is_new {
        writer.write_record(columns.iter().map(|(name, _)| *name))?;
    }
    writer.write_record(columns.iter().map(|(_, value)| value.as_str()))?;
    writer.flush().with_context(|| format!("Écriture dans {} échouée", path.display()))?;
    Ok(())
}
