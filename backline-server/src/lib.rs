use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
    thread,
};

use axum::routing::get;
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use backline_core::{Backline, BandEvent, PgDatabase};

mod auth;
mod bands;
mod context;
mod docs;
mod errors;
mod schemas;
mod serialized;
mod setlists;
mod songs;

pub use context::ServerContext;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9600;

pub type Router = axum::Router<ServerContext>;

/// Starts the backline server
pub async fn run_server(backline: Backline<PgDatabase>) {
    let port = env::var("BACKLINE_SERVER_PORT")
        .map(|x| x.parse::<u16>().expect("Port must be a number"))
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let context = ServerContext {
        backline: Arc::new(backline),
    };

    spawn_event_logger(&context);

    let version_one_router = Router::new()
        .nest("/auth", auth::router())
        .nest(
            "/bands",
            bands::router()
                .merge(songs::band_router())
                .merge(setlists::band_router()),
        )
        .nest("/songs", songs::router())
        .nest("/invitations", bands::invitation_router());

    let root_router = Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    info!("Listening on port {}", port);

    axum::serve(listener, root_router.into_make_service())
        .await
        .unwrap();
}

/// Turns system events into log lines on a dedicated thread
fn spawn_event_logger(context: &ServerContext) {
    let backline = context.backline.clone();

    thread::spawn(move || loop {
        match backline.wait_for_event() {
            BandEvent::MemberJoined {
                band_id,
                new_member,
            } => info!(
                "{} joined band {}",
                new_member.user.display_name, band_id
            ),
            BandEvent::MemberLeft { band_id, user_id } => {
                info!("User {} left band {}", user_id, band_id)
            }
            BandEvent::MemberRoleUpdated {
                band_id,
                user_id,
                role,
            } => info!("User {} in band {} is now a {}", user_id, band_id, role.as_str()),
            BandEvent::SongApproved { band_id, song } => {
                info!("Band {} approved {} into its repertoire", band_id, song.title)
            }
            BandEvent::InvitationAccepted {
                band_id,
                invitation,
            } => info!(
                "{} accepted an invitation to band {}",
                invitation.invited_email, band_id
            ),
        }
    });
}
