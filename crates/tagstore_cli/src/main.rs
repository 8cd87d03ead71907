//! `tagstore` command line entry point.
//!
//! # Responsibility
//! - Parse one command, run it against a repository opened from the
//!   environment, and print the result as JSON.
//! - Report failures as a JSON error body on stderr with a status-derived
//!   exit code.

mod status;

use clap::{Args, Parser, Subcommand};
use log::{error, info};
use serde::Serialize;
use status::{ErrorBody, Status};
use std::process::ExitCode;
use tagstore_core::{
    init_logging_from_config, open_repository, Color, Configuration, NewResource, NewTag,
    RecordStore, RelationshipIndex, RepoResult, Repository, Resource, ResourceParams, Tag,
    TagParams,
};

#[derive(Parser)]
#[command(name = "tagstore")]
#[command(version, about = "Tagged resource repository", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print compact single-line JSON
    #[arg(long, global = true)]
    compact: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Manage resources
    Resource {
        #[command(subcommand)]
        action: ResourceAction,
    },
    /// Manage tags
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },
}

#[derive(Subcommand)]
enum ResourceAction {
    /// Create a resource and any tags it names
    Create(CreateResourceArgs),
    /// Show one resource
    Get { id: String },
    /// List resources, optionally filtered by type, name or tag
    List {
        /// Filter as key=value; repeatable
        #[arg(short, long = "filter", value_parser = parse_pair)]
        filters: Vec<(String, String)>,
    },
    /// Attach a tag to a resource
    Tag { id: String, tag: String },
    /// Detach a tag from a resource
    Untag { id: String, tag: String },
}

#[derive(Args)]
struct CreateResourceArgs {
    #[arg(long)]
    id: String,
    #[arg(long)]
    name: String,
    #[arg(long = "type")]
    kind: String,
    /// Tag name; repeatable
    #[arg(short, long = "tag")]
    tags: Vec<String>,
}

#[derive(Subcommand)]
enum TagAction {
    /// Create a tag; an existing tag is returned unchanged
    Create {
        name: String,
        /// Hex color such as #FF0000; random palette color when omitted
        #[arg(short, long, value_parser = Color::parse)]
        color: Option<Color>,
    },
    /// Show one tag
    Get { name: String },
    /// List tags, optionally filtered by name or color
    List {
        /// Filter as key=value; repeatable
        #[arg(short, long = "filter", value_parser = parse_pair)]
        filters: Vec<(String, String)>,
    },
    /// List resources carrying a tag
    Resources { name: String },
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Output {
    Resource(Resource),
    Resources(Vec<Resource>),
    Tag(Tag),
    Tags(Vec<Tag>),
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing filter key in `{raw}`"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

fn pairs(filters: &[(String, String)]) -> impl Iterator<Item = (&str, &str)> {
    filters
        .iter()
        .map(|(key, value)| (key.as_str(), value.as_str()))
}

fn execute<S, I>(repo: &Repository<S, I>, command: Command) -> RepoResult<Output>
where
    S: RecordStore,
    I: RelationshipIndex,
{
    let output = match command {
        Command::Resource { action } => match action {
            ResourceAction::Create(args) => {
                let mut resource = NewResource::new(args.id, args.name, args.kind);
                for tag in args.tags {
                    resource = resource.tagged(tag);
                }
                Output::Resource(repo.create_resource(&resource)?)
            }
            ResourceAction::Get { id } => Output::Resource(repo.find_resource_by_id(&id)?),
            ResourceAction::List { filters } => {
                let params = ResourceParams::from_pairs(pairs(&filters));
                Output::Resources(repo.find_all_resources(Some(&params))?)
            }
            ResourceAction::Tag { id, tag } => {
                Output::Resource(repo.add_tag_to_resource(&id, &tag)?)
            }
            ResourceAction::Untag { id, tag } => {
                Output::Resource(repo.delete_tag_from_resource(&id, &tag)?)
            }
        },
        Command::Tag { action } => match action {
            TagAction::Create { name, color } => {
                let tag = match color {
                    Some(color) => NewTag::with_color(name, color),
                    None => NewTag::named(name),
                };
                Output::Tag(repo.create_tag(&tag)?)
            }
            TagAction::Get { name } => Output::Tag(repo.find_tag_by_name(&name)?),
            TagAction::List { filters } => {
                let params = TagParams::from_pairs(pairs(&filters));
                Output::Tags(repo.find_all_tags(Some(&params))?)
            }
            TagAction::Resources { name } => Output::Resources(repo.find_resources_by_tag(&name)?),
        },
    };
    Ok(output)
}

fn to_json<T: Serialize>(value: &T, compact: bool) -> String {
    let rendered = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    rendered.unwrap_or_else(|err| {
        format!("{{\"status\":500,\"error\":\"encode\",\"message\":\"{err}\"}}")
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Configuration::from_env();

    if let Err(err) = init_logging_from_config(&config) {
        eprintln!("logging disabled: {err}");
    }

    let repo = match open_repository(&config) {
        Ok(repo) => repo,
        Err(err) => {
            error!("event=cli_start module=cli status=error error={}", err);
            eprintln!("tagstore: {err}");
            return ExitCode::from(Status::Internal.exit_code());
        }
    };

    match execute(&repo, cli.command) {
        Ok(output) => {
            info!("event=cli_command module=cli status=ok");
            println!("{}", to_json(&output, cli.compact));
            ExitCode::SUCCESS
        }
        Err(err) => {
            let status = Status::of(&err);
            info!(
                "event=cli_command module=cli status=error error_code={} http_status={}",
                err.code(),
                status.http_code()
            );
            eprintln!("{}", to_json(&ErrorBody::from_repo(&err), cli.compact));
            ExitCode::from(status.exit_code())
        }
    }
}
