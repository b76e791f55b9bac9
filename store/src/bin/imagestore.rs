use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use imagestore::blobstore::{self, BlobStore};
use imagestore::client::{ClientConfig, ImageStoreClient};
use imagestore::imageservice::{ImageService, TieredImageService};
use imagestore::proto::image_store_server::ImageStoreServer;
use imagestore::proto::GRPCImageStoreWrapper;
use imagestore::retention::RetentionPolicy;
use imagestore::smoke;
use imagestore::tls::TlsPaths;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_listener::{Listener, ListenerAddressLFlag, SystemOptions};
use tonic::transport::Server;
use tracing::{info, warn, Level};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// A global log level to use when printing logs.
    /// It's also possible to set `RUST_LOG` according to
    /// `tracing_subscriber::filter::EnvFilter`, which will always have
    /// priority.
    #[arg(long, default_value_t=Level::INFO)]
    log_level: Level,

    /// Whether to log in JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Connection settings shared by all client commands.
#[derive(Args, Clone)]
struct ClientArgs {
    /// Address of the ImageStore.
    /// Defaults to grpc+https://localhost:50055, or grpc+http in dev mode.
    #[arg(long, env = "IMAGESTORE_ADDR")]
    addr: Option<url::Url>,

    #[arg(
        long,
        env,
        default_value = "/etc/ssl/imagestore/imagestore_client_certificate.pem"
    )]
    client_cert: PathBuf,

    #[arg(long, env, default_value = "/etc/ssl/imagestore/imagestore_client_key.pem")]
    client_key: PathBuf,

    #[arg(long, env, default_value = "/etc/ssl/ca/ca_certificate.pem")]
    ca_cert: PathBuf,

    /// Name the server certificate is checked against, defaults to the
    /// host in --addr.
    #[arg(long, env)]
    domain_name: Option<String>,

    /// Per-request timeout, in seconds.
    #[arg(long, env, default_value_t = 1)]
    timeout: u64,

    /// Connect without TLS.
    #[arg(long, env = "DEV_MODE")]
    dev_mode: bool,
}

impl ClientArgs {
    fn client_config(&self) -> ClientConfig {
        let url = self.addr.clone().unwrap_or_else(|| {
            if self.dev_mode {
                "grpc+http://localhost:50055"
            } else {
                "grpc+https://localhost:50055"
            }
            .parse()
            .expect("invalid fallback address")
        });

        let mut config = ClientConfig::new(url);
        config.timeout = Duration::from_secs(self.timeout);
        config.domain_name = self.domain_name.clone();
        if !self.dev_mode {
            config.tls = Some(TlsPaths {
                ca_cert: self.ca_cert.clone(),
                cert: self.client_cert.clone(),
                key: self.client_key.clone(),
            });
        }

        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the imagestore daemon.
    Daemon {
        #[clap(flatten)]
        listen_args: ListenerAddressLFlag,

        #[arg(long, env, default_value = "memory://")]
        inmemory_store_addr: String,

        #[arg(long, env, default_value = "objectstore+file:///var/lib/imagestore")]
        persistent_store_addr: String,

        /// Blobs older than this many seconds are removed from the
        /// persistent tier.
        #[arg(long, env, default_value_t = 3600)]
        retention_time: u64,

        /// Seconds between two retention sweeps.
        #[arg(long, env, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
        retention_poll_interval: u64,

        /// Also apply the retention policy to the in-memory tier.
        #[arg(long, env)]
        sweep_inmemory: bool,

        /// Largest blob a single store may upload, in bytes.
        #[arg(long, env, default_value_t = 256 * 1024 * 1024)]
        max_blob_size: usize,

        #[arg(
            long,
            env,
            default_value = "/etc/ssl/imagestore/imagestore_server_certificate.pem"
        )]
        server_cert: PathBuf,

        #[arg(long, env, default_value = "/etc/ssl/imagestore/imagestore_server_key.pem")]
        server_key: PathBuf,

        /// CA client certificates need to be signed by.
        #[arg(long, env, default_value = "/etc/ssl/ca/ca_certificate.pem")]
        ca_cert: PathBuf,

        /// Serve plaintext gRPC, without TLS.
        #[arg(long, env = "DEV_MODE")]
        dev_mode: bool,
    },
    /// Reads a blob, and writes it to a file or stdout.
    Read {
        handle: String,

        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        #[clap(flatten)]
        client_args: ClientArgs,
    },
    /// Stores a file (or stdin), and prints the handle.
    Store {
        #[clap(value_name = "PATH")]
        input: Option<PathBuf>,

        #[arg(long, default_value = "inmemory")]
        tier: String,

        #[clap(flatten)]
        client_args: ClientArgs,
    },
    /// Removes a blob.
    Remove {
        handle: String,

        #[clap(flatten)]
        client_args: ClientArgs,
    },
    /// Runs read, store and remove against a running daemon, and checks the
    /// results.
    Smoke {
        /// Additionally store this file, and read it back.
        #[arg(long)]
        input: Option<PathBuf>,

        /// Where to write the blob read back from --input.
        #[arg(long, requires = "input")]
        output: Option<PathBuf>,

        /// The tier --input is stored in.
        #[arg(long, default_value = "inmemory")]
        tier: String,

        #[clap(flatten)]
        client_args: ClientArgs,
    },
}

async fn read_input(path: Option<PathBuf>) -> io::Result<Bytes> {
    match path {
        Some(path) => Ok(tokio::fs::read(path).await?.into()),
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin().read_to_end(&mut buf).await?;
            Ok(buf.into())
        }
    }
}

async fn write_output(path: Option<PathBuf>, data: &[u8]) -> io::Result<()> {
    match path {
        Some(path) => tokio::fs::write(path, data).await,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(data).await?;
            stdout.flush().await
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let mut tracing_builder = imagestore_tracing::TracingBuilder::default().level(cli.log_level);
    if cli.json {
        tracing_builder = tracing_builder.json();
    }
    tracing_builder.build()?;

    match cli.command {
        Commands::Daemon {
            listen_args,
            inmemory_store_addr,
            persistent_store_addr,
            retention_time,
            retention_poll_interval,
            sweep_inmemory,
            max_blob_size,
            server_cert,
            server_key,
            ca_cert,
            dev_mode,
        } => {
            // initialize stores
            let inmemory: Arc<dyn BlobStore> =
                Arc::from(blobstore::from_addr(&inmemory_store_addr).await?);
            let persistent: Arc<dyn BlobStore> =
                Arc::from(blobstore::from_addr(&persistent_store_addr).await?);

            let retention_policy = RetentionPolicy::new(
                Duration::from_secs(retention_time),
                Duration::from_secs(retention_poll_interval),
            );
            tokio::spawn(retention_policy.run(persistent.clone()));
            if sweep_inmemory {
                tokio::spawn(retention_policy.run(inmemory.clone()));
            }

            let image_service: Arc<dyn ImageService> =
                Arc::new(TieredImageService::new(inmemory, persistent));

            let mut server = if dev_mode {
                warn!("dev mode enabled, serving without TLS");
                Server::builder()
            } else {
                let tls_paths = TlsPaths {
                    ca_cert,
                    cert: server_cert,
                    key: server_key,
                };
                Server::builder().tls_config(tls_paths.server_config().await?)?
            };

            let router = server.add_service(ImageStoreServer::new(
                GRPCImageStoreWrapper::new(image_service).with_max_blob_size(max_blob_size),
            ));

            let listen_address = &listen_args.listen_address.unwrap_or_else(|| {
                "[::]:50055"
                    .parse()
                    .expect("invalid fallback listen address")
            });

            let listener = Listener::bind(
                listen_address,
                &SystemOptions::default(),
                &listen_args.listener_options,
            )
            .await?;

            info!(listen_address=%listen_address, "starting daemon");

            router
                .serve_with_incoming_shutdown(listener, async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!(err=%e, "unable to listen for ctrl-c");
                        std::future::pending::<()>().await;
                    }
                    info!("shutting down");
                })
                .await?;
        }
        Commands::Read {
            handle,
            output,
            client_args,
        } => {
            let client = ImageStoreClient::connect(&client_args.client_config()).await?;
            let data = client.read(&handle).await?;

            write_output(output, &data).await?;
        }
        Commands::Store {
            input,
            tier,
            client_args,
        } => {
            let client = ImageStoreClient::connect(&client_args.client_config()).await?;
            let payload = read_input(input).await?;

            println!("{}", client.store(payload, &tier).await?);
        }
        Commands::Remove {
            handle,
            client_args,
        } => {
            let client = ImageStoreClient::connect(&client_args.client_config()).await?;
            client.remove(&handle).await?;

            info!(handle=%handle, "removed");
        }
        Commands::Smoke {
            input,
            output,
            tier,
            client_args,
        } => {
            let client = ImageStoreClient::connect(&client_args.client_config()).await?;

            let input = match input {
                Some(path) => Some((read_input(Some(path)).await?, tier.as_str())),
                None => None,
            };

            let report = smoke::run(&client, input).await?;
            println!("{}", report.handle);

            if let Some((handle, data)) = report.input {
                println!("{}", handle);
                if output.is_some() {
                    write_output(output, &data).await?;
                }
            }
        }
    }

    Ok(())
}
