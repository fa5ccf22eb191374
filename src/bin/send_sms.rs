use argh::FromArgs;
use gsm_sender::client::{MAX_TEXT_CHARS, Session};
use gsm_sender::logging::init_tracing;
use gsm_sender::{ConfigLocator, GsmError, SerialOpener};
use std::path::PathBuf;
use std::process::ExitCode;

/// Send one text message through the GSM modem.
#[derive(FromArgs)]
struct Args {
    /// configuration file; searched for when omitted
    #[argh(option)]
    config: Option<PathBuf>,

    /// trace all device traffic to stderr
    #[argh(switch)]
    debug: bool,

    /// message text, at most 160 characters
    #[argh(option)]
    text: Option<String>,

    /// destination phone number
    #[argh(option)]
    number: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Args = argh::from_env();

    let (Some(text), Some(number)) = (
        args.text.as_deref().filter(|t| !t.is_empty()),
        args.number.as_deref().filter(|n| !n.is_empty()),
    ) else {
        eprintln!("Usage: send_sms [--config <path>] [--debug] --text <text> --number <number>");
        return ExitCode::FAILURE;
    };

    if text.chars().count() > MAX_TEXT_CHARS {
        println!("{}", GsmError::TextTooLong);
        return ExitCode::FAILURE;
    }

    if let Err(e) = init_tracing(args.debug) {
        eprintln!("Error: {e}");
    }

    let mut session = match Session::allocate(SerialOpener) {
        Ok(session) => session,
        Err(e) => {
            println!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if args.debug {
        session.enable_debug();
    }

    let code = run(&mut session, args.config, text, number).await;

    if let Err(e) = session.terminate().await {
        println!("Error: {e}");
    }
    code
}

async fn run(
    session: &mut Session,
    config: Option<PathBuf>,
    text: &str,
    number: &str,
) -> ExitCode {
    let path = match ConfigLocator::from_env(config).resolve() {
        Ok(path) => path,
        Err(e) => {
            println!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = session.load_config(&path) {
        println!("Error: {e}");
    }
    if let Err(e) = session.connect().await {
        println!("Error: {e}");
    }

    if !session.is_connected() {
        println!("{}", GsmError::NotConnected);
        return ExitCode::FAILURE;
    }

    match session.send_sms(text, number).await {
        Ok(reference) => println!("Message sent (reference {reference})"),
        Err(e) => println!("Error: {e}"),
    }
    ExitCode::SUCCESS
}
