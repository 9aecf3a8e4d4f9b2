use std::sync::Arc;

use actix_web::{middleware::from_fn, web, App, HttpServer};
use chrono::{Duration, Utc};
use uuid::Uuid;

use trusthub::auth;
use trusthub::clients::directory::{DirectoryClient, RemoteError};
use trusthub::memory::MemoryStore;
use trusthub::models::{
    BusinessStatus, CreateBusinessRequest, LoginRequest, NewProfile, UpdateBusinessRequest,
    UserRole,
};
use trusthub::session::{self, SessionSettings};
use trusthub::store::Store;

const PASSWORD: &str = "hunter22";

async fn seed_token(store: &MemoryStore, email: &str, role: UserRole) -> String {
    store
        .create_profile(NewProfile {
            id: Uuid::new_v4(),
            email: email.into(),
            full_name: None,
            password_hash: auth::hash_password(PASSWORD).unwrap(),
            role,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    let login = LoginRequest {
        email: email.into(),
        password: PASSWORD.into(),
    };
    let (session, _) = auth::sign_in(store, &login, Duration::days(1)).await.unwrap();
    session.token
}

/// Serves the full app on an ephemeral port and returns its base URL.
fn serve(store: Arc<MemoryStore>) -> (String, actix_web::dev::ServerHandle) {
    let data: web::Data<dyn Store> = web::Data::from(store as Arc<dyn Store>);
    let settings = web::Data::new(SessionSettings {
        ttl: Duration::days(1),
        cookie_secure: false,
    });

    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .app_data(settings.clone())
            .wrap(from_fn(session::gate))
            .configure(trusthub::configure)
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();

    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    actix_rt::spawn(server);
    (format!("http://{addr}"), handle)
}

fn registration() -> CreateBusinessRequest {
    CreateBusinessRequest {
        name: "TechFlow Solutions".into(),
        description: Some("Software consultancy".into()),
        industry: "Technology".into(),
        location: "Lagos, Nigeria".into(),
        address: "12 Marina Road".into(),
        email: "hello@techflow.ng".into(),
        phone: "+2348000000".into(),
        website: None,
        registration_number: "RC123456".into(),
        logo_url: None,
    }
}

#[actix_rt::test]
async fn client_round_trips_against_a_live_server() {
    let store = Arc::new(MemoryStore::new());
    let owner_token = seed_token(&store, "owner@example.com", UserRole::User).await;
    let admin_token = seed_token(&store, "admin@example.com", UserRole::Admin).await;
    let (base_url, handle) = serve(store);

    let anonymous = DirectoryClient::new(&base_url);
    let owner = DirectoryClient::new(&base_url).with_token(owner_token);
    let admin = DirectoryClient::new(&format!("{base_url}/api/v1/")).with_token(admin_token);
    assert_eq!(admin.base_url(), format!("{base_url}/api/v1"));

    // bearer auth is what separates these two
    assert_eq!(
        anonymous.profile_me().await.unwrap_err(),
        RemoteError::Message("Not authenticated".into())
    );
    assert_eq!(owner.profile_me().await.unwrap().email, "owner@example.com");

    let created = owner.create_business(&registration()).await.unwrap();
    assert_eq!(created.status, BusinessStatus::Pending);
    assert_eq!(owner.my_businesses().await.unwrap().len(), 1);
    assert_eq!(owner.business(created.id).await.unwrap().name, "TechFlow Solutions");

    let update = UpdateBusinessRequest {
        website: Some(Some("https://techflow.ng".into())),
        ..Default::default()
    };
    let updated = owner.update_business(created.id, &update).await.unwrap();
    assert_eq!(updated.website.as_deref(), Some("https://techflow.ng"));
    assert_eq!(updated.description.as_deref(), Some("Software consultancy"));

    owner.add_income_record(created.id, 100, "2025-01").await.unwrap();
    owner.add_income_record(created.id, 250, "2025-01").await.unwrap();
    let records = anonymous.income_records(created.id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].amount, 250);

    let err = owner
        .update_business_status(created.id, BusinessStatus::Verified, None)
        .await
        .unwrap_err();
    assert_eq!(err.message(), "Admin access required");

    let verified = admin
        .update_business_status(created.id, BusinessStatus::Verified, Some(90))
        .await
        .unwrap();
    assert!(verified.verified_at.is_some());
    assert_eq!(anonymous.verified_businesses().await.unwrap().len(), 1);
    assert_eq!(admin.all_businesses().await.unwrap().len(), 1);

    owner.delete_business(created.id).await.unwrap();
    assert_eq!(
        owner.business(created.id).await.unwrap_err().message(),
        "Business not found"
    );
    assert!(matches!(
        owner.delete_business(created.id).await,
        Err(RemoteError::Message(_))
    ));

    handle.stop(true).await;
}

#[actix_rt::test]
async fn unreachable_servers_report_transport_errors() {
    let client = DirectoryClient::new("http://127.0.0.1:9");
    assert!(matches!(
        client.verified_businesses().await,
        Err(RemoteError::Transport(_))
    ));
}
