//! Read-only views over recorded abandoned carts.

use cartwatch_core::AbandonedCartStatus;
use cartwatch_db::AbandonedCartRow;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Formats integer cents as dollars, e.g. `2000` -> `"$20.00"`.
pub(crate) fn fmt_cents(cents: i64) -> String {
    format!("${}", Decimal::new(cents, 2))
}

fn customer_label(cart: &AbandonedCartRow) -> String {
    let who = cart
        .session_id
        .as_deref()
        .map(|s| format!("session:{s}"))
        .or_else(|| cart.user_id.as_deref().map(|u| format!("user:{u}")))
        .unwrap_or_else(|| "\u{2014}".to_string());
    match cart.customer_email.as_deref() {
        Some(email) => format!("{who} <{email}>"),
        None => who,
    }
}

/// Prints a table of recent abandoned carts.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_list(
    pool: &sqlx::PgPool,
    status: Option<AbandonedCartStatus>,
    limit: i64,
) -> anyhow::Result<()> {
    let carts = cartwatch_db::list_abandoned_carts(pool, status, limit).await?;

    if carts.is_empty() {
        println!(
            "no abandoned carts found{}",
            status.map(|s| format!(" with status {s}")).unwrap_or_default()
        );
        return Ok(());
    }

    println!(
        "{:<38}{:<18}{:<9}{:<7}{:>11}  {:<6}CUSTOMER",
        "ID", "ABANDONED", "STATUS", "ITEMS", "VALUE", "PROMO"
    );
    for cart in &carts {
        println!(
            "{:<38}{:<18}{:<9}{:<7}{:>11}  {:<6}{}",
            cart.id,
            cart.abandoned_at.format("%Y-%m-%d %H:%M"),
            cart.status,
            cart.item_count,
            fmt_cents(cart.cart_value_cents),
            if cart.promotion_code_id.is_some() { "yes" } else { "no" },
            customer_label(cart),
        );
    }

    Ok(())
}

/// Prints one abandoned cart, its promotion code, and its snapshot lines.
///
/// # Errors
///
/// Returns an error if the cart does not exist or a query fails.
pub(crate) async fn run_show(pool: &sqlx::PgPool, id: Uuid) -> anyhow::Result<()> {
    let cart = match cartwatch_db::get_abandoned_cart(pool, id).await {
        Ok(cart) => cart,
        Err(cartwatch_db::DbError::NotFound) => anyhow::bail!("abandoned cart {id} not found"),
        Err(e) => return Err(e.into()),
    };

    println!("Cart:      {}", cart.id);
    println!("Customer:  {}", customer_label(&cart));
    if let Some(name) = cart.customer_name.as_deref() {
        println!("Name:      {name}");
    }
    println!("Status:    {}", cart.status);
    println!("Abandoned: {}", cart.abandoned_at.format("%Y-%m-%d %H:%M UTC"));
    println!(
        "Value:     {} ({} item(s))",
        fmt_cents(cart.cart_value_cents),
        cart.item_count
    );

    if let Some(code_id) = cart.promotion_code_id {
        let code = cartwatch_db::get_promotion_code(pool, code_id).await?;
        println!(
            "Promo:     {} (used {}/{}, expires {})",
            code.code,
            code.times_used,
            code.max_uses,
            code.expires_at.format("%Y-%m-%d")
        );
    }

    let lines = cartwatch_db::list_cart_snapshots(pool, cart.id).await?;
    println!();
    if lines.is_empty() {
        println!("(no snapshot lines)");
        return Ok(());
    }
    println!("{:<5}{:>11}{:>11}  PRODUCT", "QTY", "UNIT", "TOTAL");
    for line in &lines {
        println!(
            "{:<5}{:>11}{:>11}  {}",
            line.quantity,
            fmt_cents(line.unit_price_cents),
            fmt_cents(line.line_total_cents),
            line.product_name
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn row() -> AbandonedCartRow {
        AbandonedCartRow {
            id: Uuid::now_v7(),
            session_id: None,
            user_id: Some("user_42".to_string()),
            customer_email: Some("first@buyer.com".to_string()),
            customer_name: None,
            cart_value_cents: 2000,
            item_count: 2,
            abandoned_at: Utc::now(),
            status: "active".to_string(),
            promotion_code_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn cents_render_as_dollars() {
        assert_eq!(fmt_cents(2000), "$20.00");
        assert_eq!(fmt_cents(5), "$0.05");
        assert_eq!(fmt_cents(123_456), "$1234.56");
    }

    #[test]
    fn customer_label_includes_email_when_known() {
        assert_eq!(customer_label(&row()), "user:user_42 <first@buyer.com>");
    }

    #[test]
    fn customer_label_for_anonymous_session() {
        let cart = AbandonedCartRow {
            session_id: Some("sess_1".to_string()),
            user_id: None,
            customer_email: None,
            ..row()
        };
        assert_eq!(customer_label(&cart), "session:sess_1");
    }
}
