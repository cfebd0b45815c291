mod config;
mod keys;

use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
    str::FromStr,
};

use clap::{ArgAction, Args, Parser, Subcommand};
use referral_ledger::{
    Address, Command, LedgerError, LedgerEvent, Points, ReferralState, Role, RoleMask,
    SnapshotStore, StoreError,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::{
    config::{CliConfig, ConfigError},
    keys::KeyError,
};

#[derive(Parser, Debug)]
#[command(name = "refledger", version, about = "Referral points ledger")]
struct Cli {
    /// TOML config file (state_path, log_level, max_events).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// State file; overrides `state_path` from the config.
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Keep only the newest N events in the state file; overrides
    /// `max_events` from the config.
    #[arg(long, global = true, value_name = "N")]
    max_events: Option<usize>,

    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG wins over both.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Args, Debug)]
struct Signer {
    /// Hex secret key file of the caller.
    #[arg(long)]
    key: PathBuf,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Generate a new Ed25519 key and print its address.
    Keygen {
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the address controlled by a key.
    Address {
        #[arg(long)]
        key: PathBuf,
    },
    /// Create an empty state owned by the given key.
    Init {
        #[arg(long)]
        owner_key: PathBuf,
        /// Replace an existing state file.
        #[arg(long)]
        force: bool,
    },
    /// Set the role bitmask of an account (owner only).
    UpdateRole {
        #[command(flatten)]
        signer: Signer,
        target: Address,
        /// Number (`5`, `0x5`) or role names (`issuer,seller`).
        #[arg(value_parser = parse_mask)]
        mask: RoleMask,
    },
    TransferOwnership {
        #[command(flatten)]
        signer: Signer,
        new_owner: Address,
    },
    RenounceOwnership {
        #[command(flatten)]
        signer: Signer,
    },
    Issue {
        #[command(flatten)]
        signer: Signer,
        account: Address,
        amount: Points,
    },
    /// Issue to several accounts at once; all entries apply or none do.
    BulkIssue {
        #[command(flatten)]
        signer: Signer,
        /// `<account>=<amount>`, repeatable.
        #[arg(long = "entry", required = true)]
        entries: Vec<Entry>,
    },
    Consume {
        #[command(flatten)]
        signer: Signer,
        account: Address,
        amount: Points,
    },
    BulkConsume {
        #[command(flatten)]
        signer: Signer,
        #[arg(long = "entry", required = true)]
        entries: Vec<Entry>,
    },
    /// Mark one or more accounts as known.
    AddKnown {
        #[command(flatten)]
        signer: Signer,
        #[arg(required = true)]
        accounts: Vec<Address>,
    },
    /// Run a JSON array of commands. The state is saved only if all succeed.
    Exec {
        #[command(flatten)]
        signer: Signer,
        file: PathBuf,
    },
    /// Print issued, consumed and available points of an account.
    Balance {
        account: Address,
    },
    Holders,
    Known,
    Roles {
        account: Address,
    },
    HasRole {
        account: Address,
        #[arg(value_parser = parse_mask)]
        mask: RoleMask,
    },
    IsValid {
        referrer: Address,
        referred: Address,
    },
    Events,
    StateRoot,
}

/// One `<account>=<amount>` pair of a bulk subcommand.
#[derive(Clone, Debug)]
struct Entry {
    account: Address,
    amount: Points,
}

impl FromStr for Entry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (account, amount) = s
            .split_once('=')
            .ok_or_else(|| format!("expected <account>=<amount>, got `{s}`"))?;
        Ok(Self {
            account: account.parse().map_err(|e| format!("{e}"))?,
            amount: amount.parse().map_err(|e| format!("{e}"))?,
        })
    }
}

fn split_entries(entries: &[Entry]) -> (Vec<Address>, Vec<Points>) {
    entries.iter().map(|e| (e.account, e.amount)).unzip()
}

fn parse_mask(s: &str) -> Result<RoleMask, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x") {
        return u64::from_str_radix(hex, 16)
            .map(RoleMask::from_bits)
            .map_err(|e| format!("{e}"));
    }
    if let Ok(bits) = s.parse::<u64>() {
        return Ok(RoleMask::from_bits(bits));
    }
    s.split([',', '|'])
        .map(|name| match name.trim() {
            "issuer" => Ok(Role::Issuer),
            "consumer" => Ok(Role::Consumer),
            "seller" => Ok(Role::Seller),
            other => Err(format!("unknown role `{other}`")),
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no state at {0}; run `refledger init` first")]
    MissingState(PathBuf),
    #[error("state already exists at {0}; pass --force to replace it")]
    StateExists(PathBuf),
    #[error("cannot read command file {path}: {source}")]
    CommandFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid command file {path}: {source}")]
    CommandJson {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("command #{index} ({name}) failed: {source}")]
    Batch {
        index: usize,
        name: &'static str,
        source: LedgerError,
    },
}

fn init_tracing(configured: &str, verbose: u8) {
    let level = match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(level),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match CliConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.log_level, cli.verbose);

    let state_path = cli.state.clone().unwrap_or(config.state_path);
    let max_events = cli.max_events.or(config.max_events);
    match run(cli.command, &StateFile::new(&state_path, max_events)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            ExitCode::FAILURE
        }
    }
}

/// The state file plus how much event history it keeps.
struct StateFile {
    store: SnapshotStore,
    max_events: Option<usize>,
}

impl StateFile {
    fn new(path: &Path, max_events: Option<usize>) -> Self {
        Self {
            store: SnapshotStore::new(path),
            max_events,
        }
    }

    fn load(&self) -> Result<ReferralState, CliError> {
        self.store
            .load_state()?
            .ok_or_else(|| CliError::MissingState(self.store.path().to_path_buf()))
    }

    fn save(&self, state: &mut ReferralState) -> Result<(), CliError> {
        if let Some(keep) = self.max_events {
            state.prune_events(keep);
        }
        self.store.save(&state.snapshot())?;
        Ok(())
    }
}

fn run(command: CliCommand, file: &StateFile) -> Result<(), CliError> {
    match command {
        CliCommand::Keygen { out } => {
            let sk = keys::generate(&out)?;
            info!(path = %out.display(), "key written");
            println!("{}", keys::address_of(&sk));
        }
        CliCommand::Address { key } => {
            println!("{}", keys::load_address(&key)?);
        }
        CliCommand::Init { owner_key, force } => {
            let path = file.store.path();
            if file.store.exists() && !force {
                return Err(CliError::StateExists(path.to_path_buf()));
            }
            let owner = keys::load_address(&owner_key)?;
            let mut state = ReferralState::new(owner);
            file.save(&mut state)?;
            info!(%owner, path = %path.display(), "state initialized");
            println!("{}", hex_root(&state));
        }
        CliCommand::UpdateRole {
            signer,
            target,
            mask,
        } => {
            apply(file, &signer, Command::UpdateRole { target, mask })?;
        }
        CliCommand::TransferOwnership { signer, new_owner } => {
            apply(file, &signer, Command::TransferOwnership { new_owner })?;
        }
        CliCommand::RenounceOwnership { signer } => {
            apply(file, &signer, Command::RenounceOwnership)?;
        }
        CliCommand::Issue {
            signer,
            account,
            amount,
        } => {
            apply(file, &signer, Command::IssueTo { account, amount })?;
        }
        CliCommand::BulkIssue { signer, entries } => {
            let (accounts, amounts) = split_entries(&entries);
            apply(file, &signer, Command::BulkIssue { accounts, amounts })?;
        }
        CliCommand::Consume {
            signer,
            account,
            amount,
        } => {
            apply(file, &signer, Command::ConsumeFrom { account, amount })?;
        }
        CliCommand::BulkConsume { signer, entries } => {
            let (accounts, amounts) = split_entries(&entries);
            apply(file, &signer, Command::BulkConsume { accounts, amounts })?;
        }
        CliCommand::AddKnown {
            signer,
            mut accounts,
        } => {
            let command = if accounts.len() == 1 {
                Command::AddKnownAddress {
                    account: accounts.remove(0),
                }
            } else {
                Command::BulkAddKnownAddresses { accounts }
            };
            apply(file, &signer, command)?;
        }
        CliCommand::Exec {
            signer,
            file: commands,
        } => exec(file, &signer, &commands)?,
        CliCommand::Balance { account } => {
            let state = file.load()?;
            println!("issued    {}", state.issued(&account));
            println!("consumed  {}", state.consumed(&account));
            println!("available {}", state.available(&account));
        }
        CliCommand::Holders => {
            let state = file.load()?;
            for (index, account) in state.all_holders().iter().enumerate() {
                println!(
                    "{index}\t{account}\t{}\t{}",
                    state.issued(account),
                    state.consumed(account)
                );
            }
        }
        CliCommand::Known => {
            let state = file.load()?;
            for account in state.known_addresses() {
                println!("{account}");
            }
        }
        CliCommand::Roles { account } => {
            let state = file.load()?;
            println!("{}", state.roles_of(&account));
        }
        CliCommand::HasRole { account, mask } => {
            let state = file.load()?;
            println!("{}", state.has_role(&account, mask));
        }
        CliCommand::IsValid { referrer, referred } => {
            let state = file.load()?;
            println!("{}", state.is_valid(&referrer, &referred));
        }
        CliCommand::Events => {
            let state = file.load()?;
            print_events(state.events())?;
        }
        CliCommand::StateRoot => {
            let state = file.load()?;
            println!("{}", hex_root(&state));
        }
    }

    Ok(())
}

fn apply(file: &StateFile, signer: &Signer, command: Command) -> Result<(), CliError> {
    let mut state = file.load()?;
    let caller = keys::load_address(&signer.key)?;
    let events = state.execute(&caller, &command)?;
    file.save(&mut state)?;
    info!(%caller, command = command.name(), events = events.len(), "command applied");
    print_events(&events)
}

fn exec(file: &StateFile, signer: &Signer, path: &Path) -> Result<(), CliError> {
    let raw = fs::read(path).map_err(|source| CliError::CommandFile {
        path: path.to_path_buf(),
        source,
    })?;
    let commands: Vec<Command> =
        serde_json::from_slice(&raw).map_err(|source| CliError::CommandJson {
            path: path.to_path_buf(),
            source,
        })?;

    let mut state = file.load()?;
    let caller = keys::load_address(&signer.key)?;
    let mut events = Vec::new();
    for (index, command) in commands.iter().enumerate() {
        let emitted = state
            .execute(&caller, command)
            .map_err(|source| CliError::Batch {
                index,
                name: command.name(),
                source,
            })?;
        events.extend(emitted);
    }
    file.save(&mut state)?;
    info!(%caller, commands = commands.len(), events = events.len(), "batch applied");
    print_events(&events)
}

fn print_events(events: &[LedgerEvent]) -> Result<(), CliError> {
    for event in events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}

fn hex_root(state: &ReferralState) -> String {
    format!("0x{}", hex::encode(state.state_root()))
}
