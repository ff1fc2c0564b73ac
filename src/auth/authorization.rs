use sea_orm::ConnectionTrait;
use uuid::Uuid;

use crate::db::orders as order_db;
use crate::db::rooms as room_db;
use crate::error::{AppError, AppResult};
use crate::models::{gigs, orders, rooms, users};

/// How a user relates to a given order. Drives every permission check on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Buyer,
    /// Owner of the gig the order was placed on.
    Seller,
    /// Admin with no other stake in the order.
    Admin,
    Stranger,
}

impl Party {
    pub fn of(user: &users::Model, order: &orders::Model, gig: &gigs::Model) -> Self {
        if order.buyer_id == user.id {
            Party::Buyer
        } else if gig.seller_id == user.id {
            Party::Seller
        } else if user.is_admin() {
            Party::Admin
        } else {
            Party::Stranger
        }
    }

    pub fn can_view(self) -> bool {
        self != Party::Stranger
    }
}

/// Load an order with its gig and the caller's relation to it. Strangers are
/// refused here, so callers only branch on the three real parties.
pub async fn load_order_for<C: ConnectionTrait>(
    db: &C,
    order_id: Uuid,
    user: &users::Model,
) -> AppResult<(orders::Model, gigs::Model, Party)> {
    let (order, gig) = order_db::get_order_with_gig(db, order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))?;

    let party = Party::of(user, &order, &gig);
    if !party.can_view() {
        return Err(AppError::Forbidden(
            "You are not a party to this order".to_string(),
        ));
    }

    Ok((order, gig, party))
}

/// Load a chat room and make sure `user_id` is one of its two participants.
pub async fn verify_room_participant<C: ConnectionTrait>(
    db: &C,
    room_id: Uuid,
    user_id: Uuid,
) -> AppResult<rooms::Model> {
    let room = room_db::get_room_by_id(db, room_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Room {room_id} not found")))?;

    if !room.has_participant(user_id) {
        return Err(AppError::Forbidden(
            "You are not a participant in this room".to_string(),
        ));
    }

    Ok(room)
}

pub fn require_admin(user: &users::Model) -> AppResult<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin access required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::users::Roles;
    use rust_decimal::Decimal;

    fn user(role: Roles) -> users::Model {
        users::Model {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", Uuid::new_v4()),
            username: None,
            display_name: None,
            avatar_url: None,
            auth_provider: "google".to_string(),
            role,
            created_at: chrono::Utc::now(),
            updated_at: None,
        }
    }

    fn order_on(buyer: &users::Model, seller: &users::Model) -> (orders::Model, gigs::Model) {
        let now = chrono::Utc::now();
        let gig = gigs::Model {
            id: Uuid::new_v4(),
            seller_id: seller.id,
            title: "Logo design".to_string(),
            description: String::new(),
            price: Decimal::new(10000, 2),
            delivery_time_days: 3,
            thumbnail_url: None,
            is_active: true,
            created_at: now,
        };
        let order = orders::Model {
            id: Uuid::new_v4(),
            buyer_id: buyer.id,
            gig_id: gig.id,
            status_id: Some(1),
            requirements: String::new(),
            delivery_date: None,
            is_active: true,
            is_paid: false,
            external_transaction_id: None,
            platform_fee: None,
            seller_payout: None,
            payout_sent: false,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        (order, gig)
    }

    #[test]
    fn party_is_resolved_from_the_order_not_the_role() {
        let buyer = user(Roles::Seller);
        let seller = user(Roles::Buyer);
        let admin = user(Roles::Admin);
        let stranger = user(Roles::Seller);
        let (order, gig) = order_on(&buyer, &seller);

        assert_eq!(Party::of(&buyer, &order, &gig), Party::Buyer);
        assert_eq!(Party::of(&seller, &order, &gig), Party::Seller);
        assert_eq!(Party::of(&admin, &order, &gig), Party::Admin);
        assert_eq!(Party::of(&stranger, &order, &gig), Party::Stranger);
        assert!(!Party::Stranger.can_view());
    }

    #[test]
    fn admin_buying_is_treated_as_buyer() {
        let admin = user(Roles::Admin);
        let seller = user(Roles::Seller);
        let (order, gig) = order_on(&admin, &seller);

        assert_eq!(Party::of(&admin, &order, &gig), Party::Buyer);
    }
}
