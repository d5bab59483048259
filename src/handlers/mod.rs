use crate::services::{
    carts::CartService, checkout::CheckoutService, conversations::ConversationService,
    orders::OrderService, payments::PaymentService, products::ProductService,
    reports::ReportService, reviews::ReviewService, users::UserService, webhooks::WebhookService,
    wishlists::WishlistService,
};

pub mod carts;
pub mod common;
pub mod conversations;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reports;
pub mod reviews;
pub mod users;
pub mod wishlists;

/// Service container shared through `AppState`.
#[derive(Clone)]
pub struct AppServices {
    pub users: UserService,
    pub products: ProductService,
    pub carts: CartService,
    pub orders: OrderService,
    pub checkout: CheckoutService,
    pub payments: PaymentService,
    pub webhooks: WebhookService,
    pub reviews: ReviewService,
    pub wishlists: WishlistService,
    pub conversations: ConversationService,
    pub reports: ReportService,
}
