pub mod auth;
pub mod clients;
pub mod config;
pub mod database;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod session;
pub mod store;
pub mod verification;
pub mod views;

use actix_web::web;

/// Registers the `/api/v1` scope and the page routes.
///
/// Literal segments (`verified`, `register`) are registered ahead of the
/// `{business_id}` routes that would otherwise capture them.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            // Health
            .service(handlers::health_check)
            // Auth & profile
            .service(handlers::signup)
            .service(handlers::login)
            .service(handlers::logout)
            .service(handlers::get_my_profile)
            .service(handlers::update_my_profile)
            // Directory
            .service(handlers::list_verified_businesses)
            .service(handlers::list_all_businesses)
            .service(handlers::get_business)
            .service(handlers::update_business_status)
            // Income records
            .service(handlers::list_income_records)
            .service(handlers::add_income_record)
            // Owner businesses
            .service(handlers::list_my_businesses)
            .service(handlers::create_business)
            .service(handlers::get_my_business)
            .service(handlers::update_my_business)
            .service(handlers::delete_my_business),
    )
    .service(views::home)
    .service(views::register_form)
    .service(views::register_submit)
    .service(views::directory_view)
    .service(views::business_detail)
    .service(views::dashboard)
    .service(views::owner_business_detail)
    .service(views::admin_panel)
    .service(views::login_view)
    .service(views::signup_view);
}
