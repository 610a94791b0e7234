//! HTTP surface: shared state and the route table

pub mod auth;
pub mod chatbot;
pub mod health;
pub mod registration;
pub mod syllabus;
pub mod users;

use crate::auth::SessionStore;
use crate::embeddings::EmbeddingProvider;
use crate::indexing::BackgroundIndexer;
use crate::llm::ChatFallback;
use crate::retrieval::Retriever;
use crate::snapshot::SnapshotManager;
use crate::store::{Database, EMBEDDINGS_TREE};
use crate::vectordb::SledVectorStore;
use crate::{Config, Error, Result};
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub retriever: Retriever,
    pub chat: ChatFallback,
    pub sessions: SessionStore,
    pub indexer: BackgroundIndexer,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Database,
        embedding: Arc<dyn EmbeddingProvider>,
        chat: ChatFallback,
    ) -> Result<Self> {
        let vectors = SledVectorStore::new(db.tree(EMBEDDINGS_TREE)?);
        let retriever = Retriever::new(embedding, Arc::new(vectors), &config.search);

        let snapshot = SnapshotManager::new(config.storage.snapshot_path.clone())?;
        let indexer = BackgroundIndexer::new(
            db.files.clone(),
            retriever.clone(),
            Arc::new(Mutex::new(snapshot)),
        );

        Ok(Self {
            sessions: SessionStore::new(config.server.session_ttl_secs),
            config: Arc::new(config),
            db,
            retriever,
            chat,
            indexer,
        })
    }
}

impl FromRef<AppState> for SessionStore {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

pub fn create_router(state: AppState) -> Result<Router> {
    let origin: HeaderValue = state
        .config
        .server
        .cors_origin
        .parse()
        .map_err(|e| Error::Config(format!("Invalid CORS_ORIGIN: {e}")))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    let body_limit = state.config.server.max_upload_bytes;

    let app = Router::new()
        .route("/", get(health::home))
        .route("/health", get(health::health_check))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/add_syllabus", post(syllabus::add_syllabus))
        .route("/syllabi", get(syllabus::professor_syllabi))
        .route("/syllabi/all", get(syllabus::all_syllabi))
        .route("/get_pdf/{pdf_id}", get(syllabus::get_pdf_file))
        .route("/syllabus/{pdf_id}", get(syllabus::get_single_syllabus))
        .route("/update_syllabus/{pdf_id}", put(syllabus::update_syllabus))
        .route("/delete_syllabus/{pdf_id}", delete(syllabus::delete_syllabus))
        .route(
            "/extract_pdf_content/{pdf_id}",
            get(syllabus::extract_pdf_content),
        )
        .route("/registration_requests", get(registration::list_requests))
        .route(
            "/registration_requests/{id}/accept",
            post(registration::accept_request),
        )
        .route(
            "/registration_requests/{id}/reject",
            delete(registration::reject_request),
        )
        .route("/students", get(users::list_students))
        .route(
            "/students/{id}",
            get(users::get_student)
                .put(users::update_student)
                .delete(users::delete_student),
        )
        .route("/professors", get(users::list_professors))
        .route(
            "/professors/{id}",
            get(users::get_professor)
                .put(users::update_professor)
                .delete(users::delete_professor),
        )
        .nest("/chatbot", chatbot::router())
        .fallback(health::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    Ok(app)
}
