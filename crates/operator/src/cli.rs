use clap::Parser;

use carestock_core::ItemId;

#[derive(Debug, Parser)]
#[command(
    name = "carestock-audit",
    about = "Compare stored stock balances with the balances implied by the movement log",
    version
)]
pub struct Cli {
    /// Audit a single item instead of every item
    #[arg(long)]
    pub item: Option<ItemId>,

    /// Database URL; overrides CARESTOCK_DATABASE_URL
    #[arg(long)]
    pub database_url: Option<String>,

    /// Print the report on one line
    #[arg(long)]
    pub compact: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_audit_everything() {
        let cli = Cli::try_parse_from(["carestock-audit"]).unwrap();
        assert!(cli.item.is_none());
        assert!(cli.database_url.is_none());
        assert!(!cli.compact);
    }

    #[test]
    fn item_must_be_a_positive_id() {
        let cli = Cli::try_parse_from(["carestock-audit", "--item", "12"]).unwrap();
        assert_eq!(cli.item, Some(ItemId::new(12).unwrap()));

        assert!(Cli::try_parse_from(["carestock-audit", "--item", "0"]).is_err());
        assert!(Cli::try_parse_from(["carestock-audit", "--item", "soap"]).is_err());
    }
}
