// 📂 Table loading - CSV files into validated in-memory tables
//
// Formats:
//   wide matrix   : header "<row label>,<col1>,<col2>,..." then "<row id>,<v1>,<v2>,..."
//   intensity     : header "activity,<value>", one row per activity
//   loans         : header "bank_id,activity,loan_amount"
//   co-occurrence : header "service,hazard,coefficient"
//
// Everything here is plumbing. The engine itself only sees the tables.

use crate::config::EngineConfig;
use crate::exposure::{Bank, ExposureMatrix, LoanRecord};
use crate::reference::{CooccurrenceTable, IntensityTable, Matrix, ReferenceData};
use crate::supply_chain::SupplyChain;
use crate::types::{ActivityId, BankId, HazardId, ServiceId};
use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

fn open(path: &Path) -> Result<csv::Reader<fs::File>> {
    ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file: {:?}", path))
}

fn parse_value(field: &str, path: &Path, line: usize) -> Result<f64> {
    field
        .parse::<f64>()
        .with_context(|| format!("Invalid number {:?} at line {} in {:?}", field, line, path))
}

/// Load a wide CSV matrix.
pub fn load_matrix<R, C>(path: &Path, table: &str) -> Result<Matrix<R, C>>
where
    R: From<String> + Ord + Clone + Display,
    C: From<String> + Ord + Clone + Display,
{
    let mut reader = open(path)?;
    let cols: Vec<String> = reader
        .headers()
        .with_context(|| format!("Failed to read header of {:?}", path))?
        .iter()
        .skip(1)
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (line_num, result) in reader.records().enumerate() {
        let line = line_num + 2;
        let record = result.with_context(|| format!("Failed to parse CSV line {} in {:?}", line, path))?;
        let id = match record.get(0) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => bail!("Missing row identifier at line {} in {:?}", line, path),
        };
        let cells = cols
            .iter()
            .zip(record.iter().skip(1))
            .map(|(col, field)| -> Result<(C, f64)> {
                Ok((C::from(col.clone()), parse_value(field, path, line)?))
            })
            .collect::<Result<Vec<_>>>()?;
        rows.push((R::from(id), cells));
    }

    let matrix = Matrix::from_rows(table, rows).with_context(|| format!("Invalid {} table in {:?}", table, path))?;
    info!(table, rows = matrix.rows().len(), cols = matrix.cols().len(), "Matrix loaded");
    Ok(matrix)
}

/// Load a two-column activity intensity table.
pub fn load_intensity(path: &Path, table: &str) -> Result<IntensityTable> {
    let mut reader = open(path)?;
    let mut entries = Vec::new();
    for (line_num, result) in reader.records().enumerate() {
        let line = line_num + 2;
        let record = result.with_context(|| format!("Failed to parse CSV line {} in {:?}", line, path))?;
        if record.len() != 2 {
            bail!("Expected 2 columns at line {} in {:?}, found {}", line, path, record.len());
        }
        entries.push((ActivityId::from(&record[0]), parse_value(&record[1], path, line)?));
    }
    IntensityTable::new(table, entries).with_context(|| format!("Invalid {} table in {:?}", table, path))
}

/// Load long-format loan records.
pub fn load_loans(path: &Path) -> Result<Vec<LoanRecord>> {
    let mut reader = open(path)?;
    let mut loans = Vec::new();
    for result in reader.deserialize() {
        let loan: LoanRecord = result.with_context(|| format!("Failed to deserialize loan record in {:?}", path))?;
        loans.push(loan);
    }
    info!(records = loans.len(), "Loan records loaded");
    Ok(loans)
}

#[derive(Debug, Deserialize)]
struct CooccurrenceRecord {
    service: ServiceId,
    hazard: HazardId,
    coefficient: f64,
}

pub fn load_cooccurrence(path: &Path) -> Result<CooccurrenceTable> {
    let mut reader = open(path)?;
    let mut entries = Vec::new();
    for result in reader.deserialize() {
        let record: CooccurrenceRecord =
            result.with_context(|| format!("Failed to deserialize co-occurrence record in {:?}", path))?;
        entries.push((record.service, record.hazard, record.coefficient));
    }
    CooccurrenceTable::new(entries).with_context(|| format!("Invalid co-occurrence table in {:?}", path))
}

/// Load a wide activity x activity Leontief inverse.
pub fn load_supply_chain(path: &Path) -> Result<SupplyChain> {
    let leontief: Matrix<ActivityId, ActivityId> = load_matrix(path, "supply chain")?;
    SupplyChain::new(leontief).with_context(|| format!("Invalid supply chain table in {:?}", path))
}

/// Load a wide bank x activity weight matrix. Each bank gets a unit
/// portfolio value, so financed footprints equal relative ones.
pub fn load_exposure_weights(path: &Path) -> Result<ExposureMatrix> {
    let weights: Matrix<BankId, ActivityId> = load_matrix(path, "exposure")?;
    let mut banks = Vec::with_capacity(weights.rows().len());
    for bank in weights.rows() {
        let exposures = weights
            .cols()
            .iter()
            .map(|activity| (activity.clone(), weights.get(bank, activity).unwrap_or(0.0)))
            .collect();
        banks.push(Bank::new(bank.clone(), 1.0, exposures).with_context(|| format!("Invalid exposure row in {:?}", path))?);
    }
    ExposureMatrix::with_activities(weights.cols().iter().cloned(), banks)
        .with_context(|| format!("Invalid exposure table in {:?}", path))
}

// ============================================================================
// INPUT MANIFEST
// ============================================================================

/// Describes one run: where each table lives plus the engine config.
/// Relative paths resolve against the manifest's own directory.
#[derive(Debug, Clone, Deserialize)]
pub struct InputManifest {
    /// Long-format loan records (bank_id, activity, loan_amount).
    #[serde(default)]
    pub loans: Option<PathBuf>,
    /// Wide bank x activity weights, as an alternative to `loans`.
    #[serde(default)]
    pub exposure: Option<PathBuf>,

    pub service_dependency: PathBuf,
    pub hazard_sensitivity: PathBuf,
    pub emissions: PathBuf,
    pub land_use: PathBuf,

    #[serde(default)]
    pub cooccurrence: Option<PathBuf>,
    #[serde(default)]
    pub supply_chain: Option<PathBuf>,

    pub config: EngineConfig,

    #[serde(skip)]
    base_dir: PathBuf,
}

impl InputManifest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read manifest: {:?}", path))?;
        let mut manifest: InputManifest = serde_json::from_str(&content).context("Failed to parse manifest JSON")?;
        manifest.config.validate().context("Invalid engine configuration in manifest")?;
        manifest.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(manifest)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Load every table the manifest names.
    pub fn load(&self) -> Result<(ExposureMatrix, ReferenceData)> {
        let exposure = match (&self.loans, &self.exposure) {
            (Some(loans), None) => {
                let records = load_loans(&self.resolve(loans))?;
                ExposureMatrix::from_loans(&records).context("Invalid loan records")?
            }
            (None, Some(weights)) => load_exposure_weights(&self.resolve(weights))?,
            (Some(_), Some(_)) => bail!("Manifest must name either `loans` or `exposure`, not both"),
            (None, None) => bail!("Manifest must name `loans` or `exposure`"),
        };

        let reference = ReferenceData {
            service_dependency: load_matrix(&self.resolve(&self.service_dependency), "service dependency")?,
            hazard_sensitivity: load_matrix(&self.resolve(&self.hazard_sensitivity), "hazard sensitivity")?,
            emissions: load_intensity(&self.resolve(&self.emissions), "emissions")?,
            land_use: load_intensity(&self.resolve(&self.land_use), "land use")?,
            cooccurrence: self
                .cooccurrence
                .as_ref()
                .map(|p| load_cooccurrence(&self.resolve(p)))
                .transpose()?,
            supply_chain: self
                .supply_chain
                .as_ref()
                .map(|p| load_supply_chain(&self.resolve(p)))
                .transpose()?,
        };

        info!(
            banks = exposure.len(),
            activities = exposure.activities().len(),
            "Inputs loaded"
        );
        Ok((exposure, reference))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ServiceCoefficients;
    use uuid::Uuid;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("eco-risk-loader-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_wide_matrix() {
        let dir = scratch_dir();
        let path = write(
            &dir,
            "dep.csv",
            "activity,water,pollination\nagriculture, 0.8, 0.7\nmining,0.3,0.0\n",
        );
        let matrix: ServiceCoefficients = load_matrix(&path, "service dependency").unwrap();
        assert_eq!(matrix.rows().len(), 2);
        assert_eq!(matrix.get(&"agriculture".into(), &"pollination".into()), Some(0.7));
        assert_eq!(matrix.get(&"mining".into(), &"water".into()), Some(0.3));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_load_matrix_rejects_bad_number() {
        let dir = scratch_dir();
        let path = write(&dir, "dep.csv", "activity,water\nagriculture,abc\n");
        let err = load_matrix::<ActivityId, ServiceId>(&path, "service dependency").unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid number"));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_load_loans_and_intensity() {
        let dir = scratch_dir();
        let loans = write(
            &dir,
            "loans.csv",
            "bank_id,activity,loan_amount\nBankA,agriculture,700\nBankA,mining,300\n",
        );
        let records = load_loans(&loans).unwrap();
        assert_eq!(records.len(), 2);
        let exposure = ExposureMatrix::from_loans(&records).unwrap();
        let bank = exposure.bank(&"BankA".into()).unwrap();
        assert!((bank.weight(&"agriculture".into()) - 0.7).abs() < 1e-12);
        assert_eq!(bank.portfolio_value, 1000.0);

        let emissions = write(&dir, "ghg.csv", "activity,intensity\nagriculture,2.5\nmining,4\n");
        let table = load_intensity(&emissions, "emissions").unwrap();
        assert_eq!(table.get(&"mining".into()), Some(4.0));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_negative_intensity_rejected() {
        let dir = scratch_dir();
        let path = write(&dir, "lu.csv", "activity,intensity\nagriculture,-1\n");
        assert!(load_intensity(&path, "land use").is_err());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_manifest_load() {
        let dir = scratch_dir();
        write(&dir, "weights.csv", "bank,agriculture,mining\nBankA,0.7,0.3\nBankB,0.2,0.8\n");
        write(&dir, "dep.csv", "activity,pollination\nagriculture,0.8\nmining,0.1\n");
        write(&dir, "haz.csv", "activity,floods\nagriculture,0.5\nmining,0.2\n");
        write(&dir, "ghg.csv", "activity,value\nagriculture,1\nmining,2\n");
        write(&dir, "lu.csv", "activity,value\nagriculture,3\nmining,0\n");
        write(&dir, "co.csv", "service,hazard,coefficient\npollination,floods,0.4\n");
        let manifest_path = write(
            &dir,
            "manifest.json",
            r#"{
                "exposure": "weights.csv",
                "service_dependency": "dep.csv",
                "hazard_sensitivity": "haz.csv",
                "emissions": "ghg.csv",
                "land_use": "lu.csv",
                "cooccurrence": "co.csv",
                "config": { "contagion_threshold": 0.1 }
            }"#,
        );

        let manifest = InputManifest::from_file(&manifest_path).unwrap();
        let (exposure, reference) = manifest.load().unwrap();
        assert_eq!(exposure.len(), 2);
        assert_eq!(exposure.bank(&"BankB".into()).unwrap().portfolio_value, 1.0);
        assert_eq!(reference.cooccurrence.as_ref().map(|c| c.len()), Some(1));
        assert!(reference.supply_chain.is_none());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_manifest_needs_exactly_one_exposure_source() {
        let dir = scratch_dir();
        let manifest_path = write(
            &dir,
            "manifest.json",
            r#"{
                "service_dependency": "dep.csv",
                "hazard_sensitivity": "haz.csv",
                "emissions": "ghg.csv",
                "land_use": "lu.csv",
                "config": { "contagion_threshold": 0.1 }
            }"#,
        );
        let manifest = InputManifest::from_file(&manifest_path).unwrap();
        assert!(manifest.load().is_err());
        fs::remove_dir_all(dir).ok();
    }
}
