use argh::FromArgs;
use gsm_sender::client::{Session, share};
use gsm_sender::logging::init_tracing;
use gsm_sender::server::{AppState, BasicCredentials, DEFAULT_BIND, serve};
use gsm_sender::{ConfigLocator, SerialOpener};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Accept text messages over HTTP and send them through the GSM modem.
#[derive(FromArgs)]
struct Args {
    /// configuration file; searched for when omitted
    #[argh(option)]
    config: Option<PathBuf>,

    /// address to listen on
    #[argh(option, default = "DEFAULT_BIND.to_string()")]
    bind: String,

    /// trace all device traffic to stderr
    #[argh(switch)]
    debug: bool,

    /// basic auth user; auth is on when both user and password are set
    #[argh(option)]
    username: Option<String>,

    /// basic auth password
    #[argh(option)]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Args = argh::from_env();

    if let Err(e) = init_tracing(args.debug) {
        eprintln!("Error: {e}");
    }

    let mut session = match Session::allocate(SerialOpener) {
        Ok(session) => session,
        Err(e) => {
            error!(error = %e, "allocating session");
            return ExitCode::FAILURE;
        }
    };
    if args.debug {
        session.enable_debug();
    }

    let path = match ConfigLocator::from_env(args.config).resolve() {
        Ok(path) => path,
        Err(e) => {
            error!(error = %e, "locating configuration");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = session.load_config(&path) {
        error!(error = %e, "loading configuration");
    }
    if let Err(e) = session.connect().await {
        error!(error = %e, "connecting");
    }

    if !session.is_connected() {
        error!("Phone is not connected");
        if let Err(e) = session.terminate().await {
            error!(error = %e, "terminating session");
        }
        return ExitCode::FAILURE;
    }
    info!("Phone is connected");

    let shared = share(session);
    let credentials = BasicCredentials::from_options(args.username, args.password);
    let state = AppState::new(shared.clone(), credentials);

    let code = match TcpListener::bind(&args.bind).await {
        Ok(listener) => {
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(error = %e, "waiting for ctrl-c");
                }
                info!("shutting down");
            };
            match serve(listener, state, shutdown).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!(error = %e, "server failed");
                    ExitCode::FAILURE
                }
            }
        }
        Err(e) => {
            error!(error = %e, bind = %args.bind, "binding listener");
            ExitCode::FAILURE
        }
    };

    if let Err(e) = shared.lock().await.terminate().await {
        error!(error = %e, "terminating session");
    }
    code
}
