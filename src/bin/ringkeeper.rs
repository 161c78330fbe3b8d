use std::error::Error;

use clap::Parser;
use log::{info, LevelFilter};
use tonic::transport::Server;

use ringkeeper::chord_proto::chord_server::ChordServer;
use ringkeeper::chord_proto::{self};
use ringkeeper::config::{Cli, Config};
use ringkeeper::membership;
use ringkeeper::noderef::NodeRef;
use ringkeeper::service::ChordService;
use ringkeeper::state::NodeHandle;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new()
        .env()
        .with_level(LevelFilter::Info)
        .init()?;

    let cli = Cli::parse();
    let config = Config::from_cli(&cli)?;

    let self_ref = NodeRef::new(config.address.clone(), config.port);
    info!("starting node {self_ref}");

    let handle = NodeHandle::new(self_ref.clone(), config.clone());
    handle.init_as_seed();

    if let Some((peer_address, peer_port)) = &config.peer {
        let bootstrap = NodeRef::new(peer_address.clone(), *peer_port);
        info!("joining ring through {bootstrap}");
        membership::join(&handle, &bootstrap).await?;
    } else {
        info!("starting a new ring");
    }

    let maintenance_handle = handle.clone();
    tokio::spawn(async move {
        ringkeeper::maintenance::run_forever(maintenance_handle).await;
    });

    let addr = format!("{}:{}", config.address, config.port).parse()?;
    let chord_service = ChordServer::new(ChordService { handle });

    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(chord_proto::FILE_DESCRIPTOR_SET)
        .build()?;

    info!("listening on {addr}");
    Server::builder()
        .add_service(chord_service)
        .add_service(reflection_service)
        .serve(addr)
        .await?;

    Ok(())
}
