use std::{io, path::PathBuf, process::ExitCode};

use clap::{crate_version, Arg, ArgMatches, Command};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use swiftbucket::{
    model::{
        config::{SwiftSettings, ValidationPolicy},
        file::{FileRef, LocalFile},
    },
    BucketError, BucketResult, CloudBucket, SizeFallback, SwiftBucket,
};

fn cli() -> Command {
    let name_arg = || Arg::new("NAME").required(true).index(1);

    Command::new("swiftbucket")
        .version(crate_version!())
        .about("File operations against an OpenStack Swift container, configured from SWIFT_* variables")
        .subcommand_required(true)
        .arg(
            Arg::new("local-root")
                .long("local-root")
                .default_value("assets")
                .global(true),
        )
        .arg(
            Arg::new("policy")
                .long("policy")
                .value_parser(["strict", "flexible"])
                .default_value("strict")
                .global(true),
        )
        .arg(
            Arg::new("size-fallback")
                .long("size-fallback")
                .value_parser(["zero", "absent"])
                .default_value("zero")
                .global(true),
        )
        .subcommand(
            Command::new("put")
                .about("upload a local file")
                .arg(Arg::new("PATH").required(true).index(1))
                .arg(Arg::new("name").long("name")),
        )
        .subcommand(
            Command::new("delete")
                .about("delete an object by its literal name")
                .arg(name_arg()),
        )
        .subcommand(
            Command::new("rename")
                .arg(Arg::new("BEFORE").required(true).index(1))
                .arg(Arg::new("AFTER").required(true).index(2)),
        )
        .subcommand(Command::new("cat").arg(name_arg()))
        .subcommand(Command::new("size").arg(name_arg()))
        .subcommand(Command::new("url").arg(name_arg()))
        .subcommand(Command::new("link").arg(name_arg()))
}

fn arg(matches: &ArgMatches, id: &str) -> String {
    matches.get_one::<String>(id).cloned().unwrap_or_default()
}

async fn write_stdout(bytes: &[u8]) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(bytes).await?;
    stdout.flush().await
}

/// `Ok(false)` when the requested object is absent.
async fn run(matches: &ArgMatches) -> BucketResult<bool> {
    let policy: ValidationPolicy = arg(matches, "policy").parse()?;
    let size_fallback = match arg(matches, "size-fallback").as_str() {
        "absent" => SizeFallback::Absent,
        _ => SizeFallback::Zero,
    };

    let settings = SwiftSettings::from_env(policy)?;
    let bucket = SwiftBucket::from_settings(&arg(matches, "local-root"), settings)?
        .with_size_fallback(size_fallback);
    info!(container = bucket.container_name(), "configured");

    match matches.subcommand() {
        Some(("put", sub)) => {
            let path = arg(sub, "PATH");
            let filename = sub.get_one::<String>("name").cloned().unwrap_or_else(|| path.clone());

            let object = bucket.put(&LocalFile::new(&path, filename)).await?;
            println!("{}", object.name);
            Ok(true)
        }
        Some(("delete", sub)) => {
            bucket.delete(FileRef::from(&arg(sub, "NAME"))).await?;
            Ok(true)
        }
        Some(("rename", sub)) => {
            let (before, after) = (arg(sub, "BEFORE"), arg(sub, "AFTER"));

            bucket
                .rename(&LocalFile::new(&after, &after), &before, &after)
                .await?;
            Ok(true)
        }
        Some(("cat", sub)) => match bucket.get_contents(FileRef::from(&arg(sub, "NAME"))).await? {
            Some(bytes) => {
                write_stdout(&bytes)
                    .await
                    .map_err(|source| BucketError::LocalIo {
                        path: PathBuf::from("<stdout>"),
                        source,
                    })?;
                Ok(true)
            }
            None => Ok(false),
        },
        Some(("size", sub)) => {
            let size = bucket.get_file_size(FileRef::from(&arg(sub, "NAME"))).await?;
            if let Some(size) = &size {
                println!("{}", size);
            }
            Ok(size.is_some())
        }
        Some(("url", sub)) => {
            let url = bucket
                .get_public_url_for(FileRef::from(&arg(sub, "NAME")))
                .await?;
            if let Some(url) = &url {
                println!("{}", url);
            }
            Ok(url.is_some())
        }
        Some(("link", sub)) => {
            let link = bucket.link_for(FileRef::from(&arg(sub, "NAME"))).await?;
            if let Some(link) = &link {
                println!("{}", link);
            }
            Ok(link.is_some())
        }
        Some((other, _)) => Err(BucketError::InvalidConfig(format!(
            "unknown command: {}",
            other
        ))),
        None => Err(BucketError::InvalidConfig("missing command".to_string())),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    info!(command = matches.subcommand_name(), "called");

    match run(&matches).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            info!("absent");
            ExitCode::from(1)
        }
        Err(err) => {
            error!(error_message=%err, error_group="run");
            eprintln!("swiftbucket: {}", err);
            ExitCode::from(2)
        }
    }
}
