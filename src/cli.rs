use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "spectql")]
#[command(author, version, about = "Run SPECTQL queries against the datasets of a catalog")]
pub struct Cli {
    /// Catalog file (TOML) listing the queryable datasets
    #[arg(required = true)]
    pub catalog: PathBuf,

    /// Query to run, e.g. "tabular/geo{*}?Prov_Name=='Uruzgan'"
    #[arg(short, long, required_unless_present = "list")]
    pub query: Option<String>,

    /// Output format; overrides the query's `:format` tag
    #[arg(short, long)]
    pub format: Option<String>,

    /// Print the catalog's resource paths and exit
    #[arg(short, long)]
    pub list: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_args() {
        let cli = Cli::try_parse_from([
            "spectql",
            "catalog.toml",
            "-q",
            "tabular/geo{*}",
            "--format",
            "csv",
        ])
        .unwrap();

        assert_eq!(cli.catalog, PathBuf::from("catalog.toml"));
        assert_eq!(cli.query.as_deref(), Some("tabular/geo{*}"));
        assert_eq!(cli.format.as_deref(), Some("csv"));
        assert!(!cli.list);
    }

    #[test]
    fn test_query_required_unless_listing() {
        assert!(Cli::try_parse_from(["spectql", "catalog.toml"]).is_err());
        assert!(Cli::try_parse_from(["spectql", "catalog.toml", "--list"]).is_ok());
    }
}
