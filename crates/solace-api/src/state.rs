use std::sync::Arc;

use solace_db::Database;

use crate::responder::Responder;
use crate::service::ChatService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub chats: ChatService,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, jwt_secret: String, responder: Arc<dyn Responder>) -> AppState {
        let chats = ChatService::new(db.clone(), responder);
        Arc::new(Self { db, jwt_secret, chats })
    }
}
