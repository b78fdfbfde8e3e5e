//! `carshare` - CLI for the carshare marketplace core
//!
//! This binary creates listings, chats with owners and prices rentals using
//! the adapters selected in configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::BufRead;

use anyhow::{bail, Context};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use carshare::auth::{authorization_url, new_state, ClientConfig, Pkce};
use carshare::chat::Sender;
use carshare::cli::{
    AuthCommand, ChatCommand, Cli, Command, ConfigCommand, ListingArgs, ListingCommand,
    OutputFormat, QuoteCommand,
};
use carshare::listing::{CarListing, Price};
use carshare::rental::quote;
use carshare::{init_logging, AppContext, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    match cli.command {
        Command::Listing(ListingCommand::Create(args)) => handle_create(config, &args).await,
        Command::Listing(ListingCommand::Validate(args)) => handle_validate(&config, &args),
        Command::Chat(cmd) => handle_chat(config, cmd).await,
        Command::Quote(cmd) => handle_quote(&config, &cmd),
        Command::Auth(cmd) => handle_auth(&config, &cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

async fn handle_create(config: Config, args: &ListingArgs) -> anyhow::Result<()> {
    let draft = args.to_draft()?;
    let app = AppContext::from_config(config)?;
    app.wallet().connect().await?;

    let submitted = match app.submitter().submit(&draft).await {
        Ok(submitted) => submitted,
        Err(e) => {
            tracing::error!(error = %e, "Listing not created");
            bail!(e.user_message());
        }
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&submitted.listing)?),
        OutputFormat::Plain => {
            print_listing(&submitted.listing);
            println!("  Transaction:   {}", submitted.receipt.transaction_hash);
            println!("  Block:         {}", submitted.receipt.block_number);
        }
    }
    Ok(())
}

fn handle_validate(config: &Config, args: &ListingArgs) -> anyhow::Result<()> {
    let draft = args.to_draft()?;
    match draft.validate(config.listing.max_images) {
        Ok(price) => {
            if args.format == OutputFormat::Json {
                let out = serde_json::json!({
                    "valid": true,
                    "name": draft.display_name(),
                    "price_per_day": price,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{} is ready to list at {price}/day.", draft.display_name());
            }
            Ok(())
        }
        Err(e) => bail!(e.user_message()),
    }
}

async fn handle_chat(mut config: Config, cmd: ChatCommand) -> anyhow::Result<()> {
    if cmd.no_delay {
        config.chat.reply_delay_min_ms = 0;
        config.chat.reply_delay_max_ms = 0;
    }
    let app = AppContext::from_config(config)?;
    let mut chat = app.conversation();

    let messages: Vec<String> = if cmd.messages.is_empty() {
        std::io::stdin()
            .lock()
            .lines()
            .collect::<std::io::Result<_>>()
            .context("reading messages from stdin")?
    } else {
        cmd.messages
    };

    for text in messages {
        if let Some(reply) = chat.send(&text).await {
            println!("you:   {}", text.trim());
            println!("owner: {}", reply.text);
        }
    }

    let owner_replies = chat
        .messages()
        .iter()
        .filter(|m| m.sender == Sender::Owner)
        .count();
    tracing::debug!(owner_replies, "Chat finished");
    Ok(())
}

fn handle_quote(config: &Config, cmd: &QuoteCommand) -> anyhow::Result<()> {
    let price: Price = cmd.price.parse()?;
    let deposit = match &cmd.deposit {
        Some(d) => d.parse::<Price>()?,
        None => config.security_deposit(),
    };
    let q = quote(cmd.start, cmd.end, price, deposit)?;

    match cmd.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&q)?),
        OutputFormat::Plain => {
            println!("Duration:        {} days", q.days);
            println!("Rental cost:     ${}", q.cost);
            println!("Security deposit: ${}", q.deposit);
            println!("Total:           ${}", q.total);
        }
    }
    Ok(())
}

fn handle_auth(config: &Config, cmd: &AuthCommand) -> anyhow::Result<()> {
    match cmd {
        AuthCommand::Url { show_verifier } => {
            let client = ClientConfig::from_settings(&config.auth);
            client.validate()?;
            let mut rng = match config.adapters.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let pkce = Pkce::generate(&mut rng);
            let state = new_state(&mut rng);
            let url = authorization_url(&client, &pkce, &state)?;
            println!("{url}");
            if *show_verifier {
                println!("code_verifier: {}", pkce.verifier());
            }
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Adapters]");
                println!("  Mode:               {:?}", config.adapters.mode);
                println!(
                    "  Seed:               {}",
                    config
                        .adapters
                        .seed
                        .map_or_else(|| "entropy".to_string(), |s| s.to_string())
                );
                println!();
                println!("[Listing]");
                println!("  Max images:         {}", config.listing.max_images);
                println!();
                println!("[Chat]");
                println!(
                    "  Reply delay:        {}-{} ms",
                    config.chat.reply_delay_min_ms, config.chat.reply_delay_max_ms
                );
                println!("  Extra rules:        {}", config.chat.rules.len());
                println!();
                println!("[Rental]");
                println!("  Security deposit:   {}", config.security_deposit());
                println!();
                println!("[Wallet]");
                println!("  Chain id:           {}", config.wallet.chain_id);
                println!("  RPC URL:            {}", config.wallet.rpc_url);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

fn print_listing(listing: &CarListing) {
    println!("Listing created: {}", listing.name);
    println!("  Id:            {}", listing.id);
    println!("  Price per day: ${}", listing.price_per_day);
    println!("  Owner:         {}", listing.owner);
    if !listing.location.address.is_empty() {
        println!("  Location:      {}", listing.location.address);
    }
    println!("  Images:        {}", listing.images.len());
    if let Some(cid) = &listing.metadata_cid {
        println!("  Metadata:      ipfs://{cid}");
    }
}
