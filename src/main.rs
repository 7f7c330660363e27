use ssc_call::channel::LocalHub;
use ssc_call::media::SampleCapture;
use ssc_call::peer::RtcConnector;
use ssc_call::utils::random_member_id;
use ssc_call::{logger, ChannelEvent, Config, Result, SessionController};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ssc-call: {e}");
            std::process::exit(2);
        }
    };
    if let Err(e) = logger::init(&config.logging) {
        eprintln!("ssc-call: {e}");
    }

    if let Err(e) = run(config).await {
        error!(error = %e, "error while init");
        // остаёмся запущенными до Ctrl-C, но ничего не делаем
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Два участника в одной комнате через локальный хаб
async fn run(config: Config) -> Result<()> {
    info!(room = %config.room, "starting loopback call");
    let hub = LocalHub::new();
    let caller = participant(&hub, &config).await?;
    let callee = participant(&hub, &config).await?;
    tokio::join!(drive(caller), drive(callee));
    Ok(())
}

async fn participant(
    hub: &LocalHub,
    config: &Config,
) -> Result<(SessionController, mpsc::UnboundedReceiver<ChannelEvent>)> {
    let member = random_member_id();
    let (channel, events) = hub.channel(config.room.clone(), member.clone());
    let connector = RtcConnector::new(&config.ice_servers)?;
    let capture = SampleCapture::new(member.clone());

    let mut controller = SessionController::new(
        Arc::new(channel),
        Arc::new(connector),
        Arc::new(capture),
        config.media,
    );

    let mut notes = controller.subscribe();
    tokio::spawn(async move {
        loop {
            match notes.recv().await {
                Ok(note) => info!(member = %member, ?note, "session event"),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(member = %member, skipped, "session events lagged")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    controller.init().await?;
    Ok((controller, events))
}

async fn drive(
    (mut controller, mut events): (SessionController, mpsc::UnboundedReceiver<ChannelEvent>),
) {
    let member = controller.member_id().to_string();
    tokio::select! {
        _ = controller.run(&mut events) => {}
        _ = tokio::signal::ctrl_c() => info!(member = %member, "interrupted"),
    }
    controller.leave().await;
}
