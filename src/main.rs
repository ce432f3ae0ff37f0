use clap::{Args, Parser, Subcommand};
use live_vote_client::config::API_URL_VAR;
use live_vote_client::voting::{BallotView, PublicLink, ResidentLookup};
use live_vote_client::{
    ClientConfig, ConnectionState, HttpVotingApi, LiveTally, LiveVoteFeed, PublicVotingFlow,
    StreamTarget, VoteStreamClient,
};
use std::process::ExitCode;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing_subscriber::EnvFilter;

#[macro_use]
extern crate tracing;

#[derive(Parser)]
#[command(name = "vote-client", version, about = "Follow live votings and cast public ballots")]
struct Cli {
    /// Backend base URL (overrides VOTE_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Follow a voting's live tally until interrupted
    Watch(WatchArgs),
    /// Cast a ballot from a public voting link, then follow progress
    Vote(VoteArgs),
}

#[derive(Args)]
struct WatchArgs {
    #[arg(long)]
    property: i64,
    #[arg(long)]
    group: i64,
    #[arg(long)]
    voting: i64,
    /// Bearer credential (overrides VOTE_API_TOKEN)
    #[arg(long)]
    token: Option<String>,
}

#[derive(Args)]
struct VoteArgs {
    /// Token from the scanned voting link
    #[arg(long)]
    link_token: String,
    #[arg(long)]
    property: Option<i64>,
    #[arg(long)]
    voting: Option<i64>,
    /// Resident identity document
    #[arg(long)]
    document: String,
    #[arg(long)]
    unit: String,
    /// Option id or code; omit to list the ballot
    #[arg(long)]
    option: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let config = ClientConfig::from_lookup(|name| match (name, &cli.api_url) {
        (API_URL_VAR, Some(url)) => Some(url.clone()),
        _ => std::env::var(name).ok(),
    });
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Watch(args) => watch(config, args).await,
        Command::Vote(args) => vote(config, args).await,
    }
}

async fn watch(config: ClientConfig, args: WatchArgs) -> ExitCode {
    let credential = args.token.or(config.api_token.clone());
    let client = VoteStreamClient::new(config.api_base_url, credential);
    let target = StreamTarget::new(args.property, args.group, args.voting);

    follow(LiveVoteFeed::new(client), target).await
}

async fn vote(config: ClientConfig, args: VoteArgs) -> ExitCode {
    let api = HttpVotingApi::new(config.api_base_url.clone());
    let link = PublicLink {
        token: Some(args.link_token),
        property_id: args.property,
        voting_id: args.voting,
    };
    let mut flow = PublicVotingFlow::new(api, link, config.progress_delay);

    if let Err(e) = flow.resolve_context().await {
        error!("Could not open the voting link: {e}");
        return ExitCode::FAILURE;
    }
    if let Some(context) = flow.context() {
        info!(
            "Voting: {} ({})",
            context.voting_title.as_deref().unwrap_or("untitled"),
            context.property_name.as_deref().unwrap_or("unknown property")
        );
    }

    let lookup = ResidentLookup {
        document: args.document,
        unit: args.unit,
    };
    if let Err(e) = flow.validate(&lookup).await {
        error!("Validation failed: {e}");
        return ExitCode::FAILURE;
    }

    let ballot = match flow.load_ballot().await {
        Ok(ballot) => ballot.clone(),
        Err(e) => {
            error!("Could not load the ballot: {e}");
            return ExitCode::FAILURE;
        }
    };

    match &ballot {
        BallotView::AlreadyVoted { choice, .. } => {
            let label = choice
                .as_ref()
                .and_then(|c| c.option_text.clone().or(c.option_code.clone()))
                .unwrap_or_else(|| "an option".to_owned());
            info!("You already voted for {label}");
        }
        BallotView::Open { voting, options } => {
            let Some(key) = args.option else {
                info!("{}", voting.title);
                for option in options {
                    info!(
                        "  [{}] {} {}",
                        option.id,
                        option.code.as_deref().unwrap_or("-"),
                        option.text
                    );
                }
                return ExitCode::SUCCESS;
            };
            let Some(option) = ballot.find_option(&key) else {
                error!("No option matches `{key}`");
                return ExitCode::FAILURE;
            };
            if let Err(e) = flow.cast_vote(option.id).await {
                error!("Vote not recorded: {e}");
                return ExitCode::FAILURE;
            }
            info!("Vote recorded: {}", option.text);
        }
    }

    let target = match flow.proceed().await {
        Ok(Some(target)) => target,
        Ok(None) => {
            info!("Live progress is not available for this voting");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let credential = flow.session_token().map(str::to_owned);
    let client = VoteStreamClient::new(config.api_base_url, credential);
    follow(LiveVoteFeed::new(client), target).await
}

async fn follow(mut feed: LiveVoteFeed, target: StreamTarget) -> ExitCode {
    let mut updates = WatchStream::new(feed.subscribe());
    feed.enable(target).await;

    let mut exit = ExitCode::SUCCESS;
    let mut started = false;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            update = updates.next() => {
                let Some(tally) = update else { break };
                report(&tally);
                match tally.state() {
                    ConnectionState::Connecting | ConnectionState::Connected => started = true,
                    ConnectionState::Error(_) => {
                        exit = ExitCode::FAILURE;
                        break;
                    }
                    ConnectionState::Disconnected if started || !feed.is_running() => break,
                    ConnectionState::Disconnected => {}
                }
            }
        }
    }

    feed.disable().await;
    exit
}

fn report(tally: &LiveTally) {
    let latest = tally.votes().last().map(|vote| {
        format!(
            "vote {} -> {}",
            vote.id,
            vote.option_label
                .as_deref()
                .or(vote.option_code.as_deref())
                .unwrap_or("?")
        )
    });
    info!(
        "[{}] {} votes{} {}",
        tally.state(),
        tally.total_count(),
        if tally.is_authoritative() { "" } else { " (provisional)" },
        latest.unwrap_or_default()
    );
}
