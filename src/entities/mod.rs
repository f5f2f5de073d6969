pub mod audit_log;
pub mod delivery;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod product;
pub mod user;

pub use audit_log::Entity as AuditLog;
pub use delivery::Entity as Delivery;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use payment::Entity as Payment;
pub use product::Entity as Product;
pub use user::Entity as User;

pub use audit_log::Model as AuditLogModel;
pub use delivery::Model as DeliveryModel;
pub use order::Model as OrderModel;
pub use order_item::Model as OrderItemModel;
pub use payment::Model as PaymentModel;
pub use product::Model as ProductModel;
pub use user::Model as UserModel;
