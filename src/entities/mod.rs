pub mod cart_item;
pub mod conversation;
pub mod message;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod product;
pub mod refund;
pub mod report;
pub mod review;
pub mod user;
pub mod wishlist_item;

pub use cart_item::Entity as CartItem;
pub use conversation::Entity as Conversation;
pub use message::Entity as Message;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use payment::Entity as Payment;
pub use product::Entity as Product;
pub use refund::Entity as Refund;
pub use report::Entity as Report;
pub use review::Entity as Review;
pub use user::Entity as User;
pub use wishlist_item::Entity as WishlistItem;
