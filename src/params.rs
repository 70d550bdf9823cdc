//! Purpose: Validated, immutable start parameters for one node run.
//! Exports: `Endpoint`, `StartParams`.
//! Role: Built by the boundary adapter from primitive inputs, handed to the collaborator.
//! Invariants: Endpoints parse; identifiers and paths are non-empty with no whitespace.
//! Invariants: `bootstrap_epoch` and `finality_depth` are non-negative.
//! Notes: Finality versus current chain height is checked by the node, not here.
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{Error, ErrorKind};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Endpoint {
    Socket(SocketAddr),
    HostPort { host: String, port: u16 },
    Url(Url),
}

impl Endpoint {
    pub fn parse(field: &str, raw: &str) -> Result<Self, Error> {
        let raw = require_token(field, raw)?;
        if let Ok(addr) = raw.parse::<SocketAddr>() {
            return Ok(Endpoint::Socket(addr));
        }
        if raw.contains("://") {
            let url = Url::parse(raw).map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("{field} is not a valid URL"))
                    .with_source(err)
            })?;
            if url.host_str().is_none_or(str::is_empty) {
                return Err(Error::new(ErrorKind::Usage).with_message(format!("{field} has no host")));
            }
            return Ok(Endpoint::Url(url));
        }
        let (host, port) = raw.rsplit_once(':').ok_or_else(|| {
            Error::new(ErrorKind::Usage).with_message(format!("{field} must be host:port or a URL"))
        })?;
        let port = port.parse::<u16>().map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("{field} has an invalid port"))
                .with_source(err)
        })?;
        if host.is_empty() || host.contains(':') {
            return Err(Error::new(ErrorKind::Usage).with_message(format!("{field} has an invalid host")));
        }
        Ok(Endpoint::HostPort {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Socket(addr) => write!(f, "{addr}"),
            Endpoint::HostPort { host, port } => write!(f, "{host}:{port}"),
            Endpoint::Url(url) => write!(f, "{url}"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StartParams {
    rpc_endpoint: Endpoint,
    f3_rpc_endpoint: Endpoint,
    initial_power_table: String,
    bootstrap_epoch: i64,
    finality_depth: i64,
    db_path: PathBuf,
    manifest_server: String,
}

impl StartParams {
    pub fn new(
        rpc_endpoint: &str,
        f3_rpc_endpoint: &str,
        initial_power_table: &str,
        bootstrap_epoch: i64,
        finality_depth: i64,
        db_path: &str,
        manifest_server: &str,
    ) -> Result<Self, Error> {
        if bootstrap_epoch < 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("bootstrap_epoch must be non-negative, got {bootstrap_epoch}")));
        }
        if finality_depth < 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("finality_depth must be non-negative, got {finality_depth}")));
        }
        Ok(Self {
            rpc_endpoint: Endpoint::parse("rpc_endpoint", rpc_endpoint)?,
            f3_rpc_endpoint: Endpoint::parse("f3_rpc_endpoint", f3_rpc_endpoint)?,
            initial_power_table: require_token("initial_power_table", initial_power_table)?.to_string(),
            bootstrap_epoch,
            finality_depth,
            db_path: PathBuf::from(require_token("db_path", db_path)?),
            manifest_server: require_token("manifest_server", manifest_server)?.to_string(),
        })
    }

    pub fn rpc_endpoint(&self) -> &Endpoint {
        &self.rpc_endpoint
    }

    pub fn f3_rpc_endpoint(&self) -> &Endpoint {
        &self.f3_rpc_endpoint
    }

    /// Content identifier or path of the power table the node starts from.
    pub fn initial_power_table(&self) -> &str {
        &self.initial_power_table
    }

    pub fn bootstrap_epoch(&self) -> i64 {
        self.bootstrap_epoch
    }

    pub fn finality_depth(&self) -> i64 {
        self.finality_depth
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn manifest_server(&self) -> &str {
        &self.manifest_server
    }
}

fn require_token<'a>(field: &str, raw: &'a str) -> Result<&'a str, Error> {
    if raw.is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message(format!("{field} is empty")));
    }
    if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("{field} contains whitespace or control characters")));
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::{Endpoint, StartParams};
    use crate::error::ErrorKind;

    fn build(bootstrap_epoch: i64, finality_depth: i64) -> Result<StartParams, crate::Error> {
        StartParams::new(
            "http://127.0.0.1:2345/rpc/v1",
            "127.0.0.1:23456",
            "bafy2bzacecpowertable",
            bootstrap_epoch,
            finality_depth,
            "/var/lib/node/f3",
            "12D3KooWManifestServer",
        )
    }

    #[test]
    fn accepts_well_formed_inputs() {
        let params = build(0, 900).expect("params");
        assert!(matches!(params.rpc_endpoint(), Endpoint::Url(_)));
        assert!(matches!(params.f3_rpc_endpoint(), Endpoint::Socket(_)));
        assert_eq!(params.finality_depth(), 900);
        assert_eq!(params.db_path().to_str(), Some("/var/lib/node/f3"));
    }

    #[test]
    fn rejects_negative_integers() {
        assert_eq!(build(-1, 900).unwrap_err().kind(), ErrorKind::Usage);
        assert_eq!(build(0, -5).unwrap_err().kind(), ErrorKind::Usage);
    }

    #[test]
    fn endpoint_forms() {
        assert_eq!(
            Endpoint::parse("f", "localhost:1234").expect("host:port"),
            Endpoint::HostPort {
                host: "localhost".to_string(),
                port: 1234
            }
        );
        assert!(matches!(Endpoint::parse("f", "[::1]:80").expect("v6"), Endpoint::Socket(_)));
        assert!(Endpoint::parse("f", "").is_err());
        assert!(Endpoint::parse("f", "localhost").is_err());
        assert!(Endpoint::parse("f", "localhost:99999").is_err());
        assert!(Endpoint::parse("f", "http://").is_err());
        assert!(Endpoint::parse("f", "127.0.0.1 :1").is_err());
    }

    #[test]
    fn empty_string_fields_are_named_in_the_error() {
        let err = StartParams::new(
            "127.0.0.1:1",
            "127.0.0.1:2",
            "",
            0,
            0,
            "/tmp/db",
            "peer",
        )
        .expect_err("empty power table");
        assert_eq!(err.message(), Some("initial_power_table is empty"));
    }
}
