pub mod auth;
pub mod chat;
pub mod gigs;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod reviews;

use actix_web::web;

use crate::chat::session;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    // ── Auth routes (protected by JWT via the AuthenticatedUser extractor) ──
    cfg.service(
        web::scope("/auth")
            .route("/me", web::get().to(auth::me))
            .route("/complete-profile", web::post().to(auth::complete_profile)),
    );

    // ── Gig routes ──
    cfg.service(
        web::scope("/gigs")
            .route("", web::post().to(gigs::create_gig))
            .route("/{id}", web::get().to(gigs::get_gig)),
    );

    // ── Order routes ──
    cfg.service(
        web::scope("/orders")
            .route("", web::get().to(orders::get_orders))
            .route("", web::post().to(orders::create_order))
            .route("/statuses", web::get().to(orders::get_statuses))
            .route("/buyer", web::get().to(orders::get_buyer_orders))
            .route("/seller", web::get().to(orders::get_seller_orders))
            .route("/{id}", web::get().to(orders::get_order))
            .route("/{id}", web::patch().to(orders::update_order))
            .route("/{id}", web::delete().to(orders::cancel_order))
            .route("/{id}/complete", web::post().to(orders::complete_order)),
    );

    // ── Payment, payout and withdrawal routes (webhook is unauthenticated) ──
    cfg.service(
        web::scope("/payments")
            .route("/webhook", web::post().to(payments::webhook))
            .route("/earnings", web::get().to(payments::get_earnings))
            .route("/withdrawals", web::get().to(payments::get_withdrawals))
            .route("/withdrawals", web::post().to(payments::request_withdrawal))
            .route(
                "/withdrawals/{id}/approve",
                web::post().to(payments::approve_withdrawal),
            )
            .route(
                "/orders/{id}/initiate",
                web::post().to(payments::initiate_payment),
            )
            .route("/orders/{id}/payout", web::post().to(payments::approve_payout)),
    );

    // ── Notification routes ──
    cfg.service(
        web::scope("/notifications")
            .route("", web::get().to(notifications::get_notifications))
            .route("/ws", web::get().to(session::user_ws))
            .route("/read-all", web::post().to(notifications::mark_all_read))
            .route("/{id}/read", web::post().to(notifications::mark_read)),
    );

    // ── Chat routes ──
    cfg.service(
        web::scope("/chat")
            .route("/rooms", web::get().to(chat::get_rooms))
            .route("/rooms", web::post().to(chat::open_room))
            .route("/rooms/{id}/messages", web::get().to(chat::get_messages))
            .route("/rooms/{id}/messages", web::post().to(chat::send_message))
            .route("/ws/{room_id}", web::get().to(session::room_ws)),
    );

    // ── Review routes ──
    cfg.service(
        web::scope("/reviews")
            .route("/orders/{order_id}", web::post().to(reviews::create_review))
            .route("/gigs/{gig_id}", web::get().to(reviews::get_gig_reviews)),
    );
}
