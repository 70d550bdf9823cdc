//! Purpose: Apply the per-subsystem verbosity policy once at process start.
//! Exports: `LogLevel`, `Subsystem`, `SubsystemRegistry`, `LogPolicy`, `LogBackend`,
//! `TracingBackend`, `apply_policy`.
//! Role: Second startup stage; the sidecar is only reachable after it succeeds.
//! Invariants: Subsystem names are fixed at build time; an unknown name is a bug in the shim.
//! Invariants: Not reconfigurable after start.
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::{Directive, LevelFilter};

use crate::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// A named logger and the tracing target its events are emitted under.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Subsystem {
    pub name: &'static str,
    pub target: &'static str,
}

pub const DHT: Subsystem = Subsystem {
    name: "dht",
    target: "dht",
};
pub const DHT_REFRESH_MANAGER: Subsystem = Subsystem {
    name: "dht/RtRefreshManager",
    target: "dht::rt_refresh_manager",
};
pub const PEER_IDENTIFY: Subsystem = Subsystem {
    name: "net/identify",
    target: "net::identify",
};
pub const SIDECAR: Subsystem = Subsystem {
    name: "f3/sidecar",
    target: "f3_sidecar",
};

#[derive(Clone, Debug)]
pub struct SubsystemRegistry {
    known: Vec<Subsystem>,
}

impl SubsystemRegistry {
    pub fn standard() -> Self {
        Self {
            known: vec![DHT, DHT_REFRESH_MANAGER, PEER_IDENTIFY, SIDECAR],
        }
    }

    pub fn register(mut self, subsystem: Subsystem) -> Self {
        if self.lookup(subsystem.name).is_none() {
            self.known.push(subsystem);
        }
        self
    }

    pub fn lookup(&self, name: &str) -> Option<Subsystem> {
        self.known.iter().copied().find(|known| known.name == name)
    }
}

impl Default for SubsystemRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LevelOverride {
    pub subsystem: String,
    pub level: LogLevel,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogPolicy {
    pub default: LogLevel,
    pub overrides: Vec<LevelOverride>,
}

impl LogPolicy {
    /// Global `info`, quiet DHT and identify chatter, verbose sidecar.
    pub fn standard() -> Self {
        let overrides = [
            (DHT, LogLevel::Error),
            (DHT_REFRESH_MANAGER, LogLevel::Warn),
            (PEER_IDENTIFY, LogLevel::Error),
            (SIDECAR, LogLevel::Debug),
        ]
        .into_iter()
        .map(|(subsystem, level)| LevelOverride {
            subsystem: subsystem.name.to_string(),
            level,
        })
        .collect();
        Self {
            default: LogLevel::Info,
            overrides,
        }
    }

    pub fn with_override(mut self, subsystem: impl Into<String>, level: LogLevel) -> Self {
        self.overrides.push(LevelOverride {
            subsystem: subsystem.into(),
            level,
        });
        self
    }
}

impl Default for LogPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Where a policy is applied. Mirrors a leveled-logger API: one global level plus named overrides.
pub trait LogBackend {
    fn set_all(&mut self, level: LogLevel);

    fn set_level(&mut self, subsystem: &str, level: LogLevel) -> Result<(), Error>;

    fn install(&mut self) -> Result<(), Error>;
}

/// Applies `policy` to `backend` in order, stopping at the first failure.
pub fn apply_policy<B>(backend: &mut B, policy: &LogPolicy) -> Result<(), Error>
where
    B: LogBackend + ?Sized,
{
    backend.set_all(policy.default);
    for entry in &policy.overrides {
        backend.set_level(&entry.subsystem, entry.level)?;
    }
    backend.install()
}

/// Builds an `EnvFilter` and installs a global `fmt` subscriber on stderr.
#[derive(Debug)]
pub struct TracingBackend {
    registry: SubsystemRegistry,
    default: LevelFilter,
    directives: Vec<Directive>,
}

impl TracingBackend {
    pub fn new(registry: SubsystemRegistry) -> Self {
        Self {
            registry,
            default: LevelFilter::INFO,
            directives: Vec::new(),
        }
    }

    pub fn filter(&self) -> EnvFilter {
        self.directives
            .iter()
            .cloned()
            .fold(EnvFilter::default().add_directive(self.default.into()), |filter, directive| {
                filter.add_directive(directive)
            })
    }
}

impl Default for TracingBackend {
    fn default() -> Self {
        Self::new(SubsystemRegistry::standard())
    }
}

impl LogBackend for TracingBackend {
    fn set_all(&mut self, level: LogLevel) {
        self.default = level.into();
        self.directives.clear();
    }

    fn set_level(&mut self, subsystem: &str, level: LogLevel) -> Result<(), Error> {
        let known = self.registry.lookup(subsystem).ok_or_else(|| {
            Error::new(ErrorKind::UnknownSubsystem)
                .with_message("logger does not exist")
                .with_subsystem(subsystem)
        })?;
        let directive = format!("{}={}", known.target, level.as_str())
            .parse::<Directive>()
            .map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("invalid log directive")
                    .with_subsystem(subsystem)
                    .with_source(err)
            })?;
        self.directives.push(directive);
        Ok(())
    }

    fn install(&mut self) -> Result<(), Error> {
        let installed = tracing_subscriber::fmt()
            .with_env_filter(self.filter())
            .with_writer(std::io::stderr)
            .try_init();
        if installed.is_err() {
            tracing::warn!(
                filter = %self.filter(),
                "global subscriber already installed; sidecar log levels not applied"
            );
        }
        Ok(())
    }
}
