//! CLI argument parsing and inventory-file loading (§6).
//!
//! The original game's argument grammar is strict: every flag is required
//! exactly once, unknown flags are rejected, and a repeated flag is an
//! error rather than the usual "last one wins". `clap`'s derive API
//! defaults to last-value-wins on repeats, so this uses the builder API
//! with `ArgAction::Append` and counts occurrences by hand instead.

use super::defaults::{ADMISSION_WAIT_SECS, DEFAULT_PORT};
use super::types::{ClientSettings, ConfigError, ParseOutcome, ServerSettings};
use crate::inventory::Inventory;
use crate::protocol;
use clap::{Arg, ArgAction, Command};
use std::path::{Path, PathBuf};

fn single<'a>(matches: &'a clap::ArgMatches, id: &'static str) -> Result<&'a String, ConfigError> {
    let mut values = matches
        .get_many::<String>(id)
        .into_iter()
        .flatten();
    let first = values.next().ok_or_else(|| ConfigError::BadFlag(id.to_string()))?;
    if values.next().is_some() {
        return Err(ConfigError::BadFlag(format!("-{id} given more than once")));
    }
    Ok(first)
}

fn server_command() -> Command {
    Command::new("roomkeeper-server")
        .no_binary_name(true)
        .disable_help_flag(true)
        .disable_version_flag(true)
        .arg(
            Arg::new("p")
                .short('p')
                .required(true)
                .action(ArgAction::Append)
                .value_name("PLAYERS"),
        )
        .arg(
            Arg::new("q")
                .short('q')
                .required(true)
                .action(ArgAction::Append)
                .value_name("QUOTA"),
        )
        .arg(
            Arg::new("i")
                .short('i')
                .required(true)
                .action(ArgAction::Append)
                .value_name("FILE"),
        )
}

/// Parses `roomkeeper-server -p <players_per_room> -q <max_quota_per_player>
/// -i <inventory_file>` (flags may appear in any order, argc must be
/// exactly 7 including the binary name, §6). Neither grammar carries a
/// port: the server always binds [`super::defaults::DEFAULT_PORT`].
/// `--print-config` alone is a convenience escape hatch: it prints the
/// resolved defaults and skips the strict grammar entirely.
pub fn parse_server_args(args: &[String]) -> Result<ParseOutcome<ServerSettings>, ConfigError> {
    if args.len() == 1 && args[0] == "--print-config" {
        return Ok(ParseOutcome::PrintConfig);
    }
    if args.len() != 6 {
        return Err(ConfigError::Usage(
            "roomkeeper-server -p <players_per_room> -q <max_quota_per_player> -i <inventory_file>".to_string(),
        ));
    }

    let matches = server_command()
        .try_get_matches_from(args)
        .map_err(|e| ConfigError::Usage(e.to_string()))?;

    let players_raw = single(&matches, "p")?.clone();
    let room_capacity: u16 = players_raw
        .parse()
        .map_err(|_| ConfigError::InvalidValue { flag: "-p", value: players_raw.clone() })?;
    let quota_raw = single(&matches, "q")?.clone();
    let max_quota: u32 = quota_raw
        .parse()
        .map_err(|_| ConfigError::InvalidValue { flag: "-q", value: quota_raw.clone() })?;
    let inventory_path = PathBuf::from(single(&matches, "i")?);

    load_inventory_file(&inventory_path)?;

    Ok(ParseOutcome::Settings(ServerSettings {
        port: DEFAULT_PORT,
        room_capacity,
        max_quota,
        inventory_path,
        log_dir: None,
        admission_deadline: std::time::Duration::from_secs(ADMISSION_WAIT_SECS),
    }))
}

fn client_command() -> Command {
    Command::new("roomkeeper-client")
        .no_binary_name(true)
        .disable_help_flag(true)
        .disable_version_flag(true)
        .arg(
            Arg::new("n")
                .short('n')
                .required(true)
                .action(ArgAction::Append)
                .value_name("NAME"),
        )
        .arg(
            Arg::new("i")
                .short('i')
                .required(true)
                .action(ArgAction::Append)
                .value_name("FILE"),
        )
        .arg(Arg::new("hostname").required(true).value_name("HOSTNAME"))
}

/// Parses `roomkeeper-client -n <player_name> -i <claim_file> <hostname>`
/// (argc must be exactly 6 including the binary name).
pub fn parse_client_args(args: &[String]) -> Result<ParseOutcome<ClientSettings>, ConfigError> {
    if args.len() == 1 && args[0] == "--print-config" {
        return Ok(ParseOutcome::PrintConfig);
    }
    if args.len() != 5 {
        return Err(ConfigError::Usage(
            "roomkeeper-client -n <player_name> -i <claim_file> <hostname>".to_string(),
        ));
    }

    let matches = client_command()
        .try_get_matches_from(args)
        .map_err(|e| ConfigError::Usage(e.to_string()))?;

    let player_name = single(&matches, "n")?.clone();
    let claim_path = PathBuf::from(single(&matches, "i")?);
    let hostname = matches
        .get_one::<String>("hostname")
        .ok_or_else(|| ConfigError::BadFlag("hostname".to_string()))?
        .clone();

    Ok(ParseOutcome::Settings(ClientSettings {
        player_name,
        claim_path,
        hostname,
        log_dir: None,
    }))
}

/// Loads the shared inventory file format (§6): one `item\tquantity` row
/// per line, blank trailing line allowed, any other line a fatal load
/// error. Used for both the server's startup inventory and (via
/// [`load_claim_file`]) the client's claim file, the two sides of the
/// same format.
pub fn load_inventory_file(path: &Path) -> Result<Inventory, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::InventoryIo {
        path: path.to_path_buf(),
        source,
    })?;

    protocol::parse_item_lines(text.lines().filter(|line| !line.trim().is_empty())).map_err(|source| {
        ConfigError::InventoryFormat {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Loads a client's claim file. Same row format as the server's inventory
/// file (§6); kept as a distinct entry point since the two are conceptually
/// different files even though today they share a parser.
pub fn load_claim_file(path: &Path) -> Result<Inventory, ConfigError> {
    load_inventory_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn strings(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn print_config_is_recognized_as_the_sole_argument() {
        let outcome = parse_server_args(&strings(&["--print-config"])).unwrap();
        assert!(matches!(outcome, ParseOutcome::PrintConfig));
    }

    #[test]
    fn server_rejects_wrong_argument_count() {
        let err = parse_server_args(&strings(&["-p", "5623"])).unwrap_err();
        assert!(matches!(err, ConfigError::Usage(_)));
    }

    #[test]
    fn server_rejects_duplicate_flag() {
        // A repeated -p both fails the exact-argc check and, independently,
        // would fail the occurrence count in `single` if it ever got past
        // it; either way this must never parse to settings.
        let args = strings(&["-p", "1", "-p", "2", "-q", "4", "-i", "inv.txt"]);
        assert!(parse_server_args(&args).is_err());
    }

    #[test]
    fn server_parses_well_formed_arguments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "gold\t10").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = strings(&["-p", "4", "-q", "5", "-i", &path]);
        let outcome = parse_server_args(&args).unwrap();
        match outcome {
            ParseOutcome::Settings(settings) => {
                assert_eq!(settings.port, DEFAULT_PORT);
                assert_eq!(settings.room_capacity, 4);
                assert_eq!(settings.max_quota, 5);
            }
            ParseOutcome::PrintConfig => panic!("expected settings"),
        }
    }

    #[test]
    fn server_accepts_flags_in_any_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "gold\t10").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = strings(&["-i", &path, "-q", "5", "-p", "4"]);
        let outcome = parse_server_args(&args).unwrap();
        match outcome {
            ParseOutcome::Settings(settings) => {
                assert_eq!(settings.room_capacity, 4);
                assert_eq!(settings.max_quota, 5);
            }
            ParseOutcome::PrintConfig => panic!("expected settings"),
        }
    }

    #[test]
    fn client_parses_well_formed_arguments() {
        let args = strings(&["-n", "Alice", "-i", "claim.txt", "example.com"]);
        let outcome = parse_client_args(&args).unwrap();
        match outcome {
            ParseOutcome::Settings(settings) => {
                assert_eq!(settings.player_name, "Alice");
                assert_eq!(settings.hostname, "example.com");
            }
            ParseOutcome::PrintConfig => panic!("expected settings"),
        }
    }

    #[test]
    fn inventory_file_parses_item_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "gold\t3").unwrap();
        writeln!(file, "silver\t1").unwrap();

        let inventory = load_inventory_file(file.path()).unwrap();
        assert_eq!(inventory.get("gold"), Some(3));
        assert_eq!(inventory.get("silver"), Some(1));
    }

    #[test]
    fn claim_file_shares_the_inventory_file_format() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "gold\t2").unwrap();

        let inventory = load_claim_file(file.path()).unwrap();
        assert_eq!(inventory.get("gold"), Some(2));
    }

    #[test]
    fn inventory_file_rejects_malformed_row() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "gold\tmany").unwrap();

        assert!(matches!(
            load_inventory_file(file.path()),
            Err(ConfigError::InventoryFormat { .. })
        ));
    }
}
