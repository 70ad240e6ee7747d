// src/config/validate.rs

use std::collections::BTreeSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{FlowError, Result};
use crate::schedule::Schedule;
use crate::types::{Action, Scope};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = FlowError;

    fn try_from(mut raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        drop_unused_triggers(&mut raw);
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_jobs(cfg)?;
    validate_engine(cfg)?;
    validate_job_references(cfg)?;
    validate_subjects(cfg)?;
    validate_checkups(cfg)?;
    validate_schedules(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_jobs(cfg: &RawConfigFile) -> Result<()> {
    if cfg.job.is_empty() {
        return Err(FlowError::Config(
            "config must contain at least one [job.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_engine(cfg: &RawConfigFile) -> Result<()> {
    if cfg.engine.workers == 0 {
        return Err(FlowError::Config(
            "[engine].workers must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.engine.queue_length == 0 {
        return Err(FlowError::Config(
            "[engine].queue_length must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.server.url.trim().is_empty() {
        return Err(FlowError::Config("[server].url must not be empty".to_string()));
    }
    Ok(())
}

fn validate_job_references(cfg: &RawConfigFile) -> Result<()> {
    for (name, job) in cfg.job.iter() {
        let mut seen = BTreeSet::new();
        for parent in job.parents.iter() {
            if !cfg.job.contains_key(&parent.name) {
                return Err(FlowError::Config(format!(
                    "job '{}' has unknown parent '{}'",
                    name, parent.name
                )));
            }
            if &parent.name == name {
                return Err(FlowError::Config(format!(
                    "job '{}' cannot be its own parent",
                    name
                )));
            }
            if !seen.insert(parent.name.as_str()) {
                return Err(FlowError::Config(format!(
                    "job '{}' lists parent '{}' more than once",
                    name, parent.name
                )));
            }
            if parent.scope == Scope::Anyone {
                return Err(FlowError::Config(format!(
                    "job '{}': parent '{}' cannot have scope ANYONE",
                    name, parent.name
                )));
            }
        }

        for checkup in job.checkups.iter() {
            for trigger in checkup.triggers.iter() {
                if !cfg.job.contains_key(trigger) {
                    return Err(FlowError::Config(format!(
                        "checkup {} of job '{}' has unknown trigger '{}'",
                        checkup.id, name, trigger
                    )));
                }
            }
        }
    }
    Ok(())
}

fn validate_subjects(cfg: &RawConfigFile) -> Result<()> {
    for (name, subject) in cfg.subject.iter() {
        for job in subject.jobs.iter() {
            if !cfg.job.contains_key(job) {
                return Err(FlowError::Config(format!(
                    "subject '{}' has unknown job '{}'",
                    name, job
                )));
            }
        }
    }
    Ok(())
}

fn validate_checkups(cfg: &RawConfigFile) -> Result<()> {
    let mut ids = BTreeSet::new();
    for (name, job) in cfg.job.iter() {
        for checkup in job.checkups.iter() {
            if !ids.insert(checkup.id) {
                return Err(FlowError::Config(format!(
                    "checkup id {} is used more than once (job '{}')",
                    checkup.id, name
                )));
            }
            if checkup.scope == Scope::Optional {
                return Err(FlowError::Config(format!(
                    "checkup {} of job '{}' cannot have scope OPTIONAL",
                    checkup.id, name
                )));
            }
            if checkup.action == Action::RebuildTrigger && checkup.triggers.is_empty() {
                return Err(FlowError::Config(format!(
                    "checkup {} of job '{}' uses REBUILD_TRIGGER without triggers",
                    checkup.id, name
                )));
            }
        }
    }
    Ok(())
}

fn validate_schedules(cfg: &RawConfigFile) -> Result<()> {
    Schedule::parse(&cfg.engine.watchdog)
        .map_err(|e| FlowError::Config(format!("[engine].watchdog: {e}")))?;
    Schedule::parse(&cfg.engine.subject_summary)
        .map_err(|e| FlowError::Config(format!("[engine].subject_summary: {e}")))?;

    for (name, job) in cfg.job.iter() {
        if let Some(expr) = job.time_restriction.as_deref() {
            Schedule::parse(expr)
                .map_err(|e| FlowError::Config(format!("job '{name}' time_restriction: {e}")))?;
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: parent -> child.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.job.keys() {
        graph.add_node(name.as_str());
    }

    for (name, job) in cfg.job.iter() {
        for parent in job.parents.iter() {
            graph.add_edge(parent.name.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(FlowError::CyclicReference {
            lineage: vec![cycle.node_id().to_string()],
        }),
    }
}

fn drop_unused_triggers(cfg: &mut RawConfigFile) {
    for (name, job) in cfg.job.iter_mut() {
        for checkup in job.checkups.iter_mut() {
            if checkup.action != Action::RebuildTrigger && !checkup.triggers.is_empty() {
                debug!(job = %name, checkup = checkup.id, action = %checkup.action, "dropping triggers");
                checkup.triggers.clear();
            }
        }
    }
}
