//! Licensed agent table join.
//!
//! Combines the agent directory, per-state license rows and carrier contract
//! rows into one record per license, plus one record for every contracted
//! agent that has no license row yet.

use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Header-keyed CSV row. Fields missing from a short row are absent.
type Record = HashMap<String, String>;

/// Locations of the licensing reference tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicensingSources {
    pub agents: PathBuf,
    pub licenses: PathBuf,
    /// Optional; a missing file means no carrier contracts
    pub carriers: PathBuf,
}

impl LicensingSources {
    /// Use the conventional file names inside a directory.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            agents: dir.join("agents.csv"),
            licenses: dir.join("agent_licenses.csv"),
            carriers: dir.join("carrier_contracts.csv"),
        }
    }

    pub fn with_agents(mut self, path: impl Into<PathBuf>) -> Self {
        self.agents = path.into();
        self
    }

    pub fn with_licenses(mut self, path: impl Into<PathBuf>) -> Self {
        self.licenses = path.into();
        self
    }

    pub fn with_carriers(mut self, path: impl Into<PathBuf>) -> Self {
        self.carriers = path.into();
        self
    }
}

/// One carrier contract of an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CarrierContract {
    pub carrier: String,
    pub contract_status: String,
    pub carrier_agent_id: String,
}

/// Carrier contracts of one agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CarrierInfo {
    pub carriers_active: Vec<String>,
    pub carriers_all: Vec<String>,
    pub carrier_details: Vec<CarrierContract>,
}

impl CarrierInfo {
    fn from_contracts(mut contracts: Vec<CarrierContract>) -> Self {
        let mut all = Vec::new();
        let mut active = Vec::new();
        let mut seen_all = HashSet::new();
        let mut seen_active = HashSet::new();

        for contract in &contracts {
            let carrier = contract.carrier.as_str();
            if carrier.is_empty() {
                continue;
            }
            if seen_all.insert(carrier) {
                all.push(carrier.to_string());
            }
            if contract.contract_status.to_lowercase() == "active" && seen_active.insert(carrier) {
                active.push(carrier.to_string());
            }
        }

        all.sort();
        active.sort();
        contracts.sort_by(|a, b| {
            (&a.carrier, &a.contract_status).cmp(&(&b.carrier, &b.contract_status))
        });

        Self {
            carriers_active: active,
            carriers_all: all,
            carrier_details: contracts,
        }
    }
}

/// Carrier contracts grouped per agent, in first-seen agent order.
#[derive(Debug, Clone, Default)]
pub struct CarrierIndex {
    order: Vec<String>,
    by_agent: HashMap<String, CarrierInfo>,
}

impl CarrierIndex {
    pub fn get(&self, agent_id: &str) -> Option<&CarrierInfo> {
        self.by_agent.get(agent_id)
    }

    /// Agents with contracts, in the order they first appear.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CarrierInfo)> {
        self.order
            .iter()
            .filter_map(|id| self.by_agent.get(id).map(|info| (id.as_str(), info)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// One output row of the licensing join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicensedAgent {
    pub agent_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub city: String,
    pub home_state: String,
    pub state_code: String,
    pub license_status: String,
    pub carriers_active: Vec<String>,
    pub carriers_all: Vec<String>,
    pub carrier_details: Vec<CarrierContract>,
}

impl LicensedAgent {
    fn new(agent_id: &str, agent: Option<&Record>, carriers: Option<&CarrierInfo>) -> Self {
        let field = |name: &str| {
            agent
                .and_then(|a| a.get(name))
                .cloned()
                .unwrap_or_default()
        };
        let carriers = carriers.cloned().unwrap_or_default();
        Self {
            agent_id: agent_id.to_string(),
            full_name: field("full_name"),
            email: field("email"),
            phone: field("phone"),
            city: field("city"),
            home_state: field("home_state"),
            state_code: String::new(),
            license_status: String::new(),
            carriers_active: carriers.carriers_active,
            carriers_all: carriers.carriers_all,
            carrier_details: carriers.carrier_details,
        }
    }
}

fn read_records(path: &Path) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        records.push(
            headers
                .iter()
                .zip(record.iter())
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
    }
    Ok(records)
}

fn require<'a>(record: &'a Record, column: &str, path: &Path) -> Result<&'a str> {
    record.get(column).map(String::as_str).ok_or_else(|| {
        Error::Csv(format!("{}: missing column {}", path.display(), column))
    })
}

/// Load the agent directory keyed by `agent_id`.
pub fn load_agents(path: &Path) -> Result<HashMap<String, Record>> {
    let mut by_id = HashMap::new();
    for record in read_records(path)? {
        let id = require(&record, "agent_id", path)?.to_string();
        by_id.insert(id, record);
    }
    Ok(by_id)
}

/// Load carrier contracts; a missing file yields an empty index.
pub fn load_carriers(path: &Path) -> Result<CarrierIndex> {
    let mut index = CarrierIndex::default();
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no carrier contracts table");
        return Ok(index);
    }

    let mut grouped: HashMap<String, Vec<CarrierContract>> = HashMap::new();
    for record in read_records(path)? {
        let field = |name: &str| record.get(name).map(|v| v.trim().to_string()).unwrap_or_default();
        let agent_id = field("agent_id");
        if agent_id.is_empty() {
            continue;
        }
        let contract = CarrierContract {
            carrier: field("carrier"),
            contract_status: field("contract_status"),
            carrier_agent_id: field("carrier_agent_id"),
        };
        if !grouped.contains_key(&agent_id) {
            index.order.push(agent_id.clone());
        }
        grouped.entry(agent_id).or_default().push(contract);
    }

    index.by_agent = grouped
        .into_iter()
        .map(|(id, contracts)| (id, CarrierInfo::from_contracts(contracts)))
        .collect();
    Ok(index)
}

/// Join the licensing tables into output rows, sorted by name then state.
pub fn build_licensed_agents(
    agents: &HashMap<String, Record>,
    licenses_path: &Path,
    carriers: &CarrierIndex,
) -> Result<Vec<LicensedAgent>> {
    let mut rows = Vec::new();
    let mut licensed: HashSet<String> = HashSet::new();

    for record in read_records(licenses_path)? {
        let agent_id = require(&record, "agent_id", licenses_path)?;
        licensed.insert(agent_id.to_string());

        let mut row = LicensedAgent::new(agent_id, agents.get(agent_id), carriers.get(agent_id));
        row.state_code = record.get("state_code").cloned().unwrap_or_default();
        row.license_status = record
            .get("license_status")
            .cloned()
            .unwrap_or_else(|| "Active".to_string());
        rows.push(row);
    }

    for (agent_id, info) in carriers.iter() {
        if licensed.contains(agent_id) {
            continue;
        }
        rows.push(LicensedAgent::new(agent_id, agents.get(agent_id), Some(info)));
    }

    rows.sort_by(|a, b| {
        (a.full_name.to_uppercase(), &a.state_code).cmp(&(b.full_name.to_uppercase(), &b.state_code))
    });
    Ok(rows)
}

/// Run the whole licensing join.
pub fn sync_licensed_agents(sources: &LicensingSources) -> Result<Vec<LicensedAgent>> {
    for path in [&sources.agents, &sources.licenses] {
        if !path.exists() {
            return Err(Error::MissingInput(path.clone()));
        }
    }

    let agents = load_agents(&sources.agents)?;
    let carriers = load_carriers(&sources.carriers)?;
    if carriers.is_empty() {
        tracing::debug!("no carrier contracts, joining licenses only");
    } else {
        tracing::debug!(agents = carriers.len(), "loaded carrier contracts");
    }
    let rows = build_licensed_agents(&agents, &sources.licenses, &carriers)?;
    tracing::info!(rows = rows.len(), agents = agents.len(), "joined licensing tables");
    Ok(rows)
}
