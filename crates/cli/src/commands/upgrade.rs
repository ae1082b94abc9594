//! Premium upgrade commands.

use popflix_client::{ClientError, PopflixClient};
use popflix_core::CheckoutSessionId;

/// Open a checkout and print where to pay.
pub async fn start(client: &PopflixClient, origin: Option<&str>) -> Result<(), ClientError> {
    let origin = match (origin, client.origin_url()) {
        (Some(origin), _) => origin.to_string(),
        (None, Some(configured)) => configured.to_string(),
        (None, None) => {
            return Err(ClientError::InvalidInput(
                "no checkout origin configured, pass --origin".to_string(),
            ));
        }
    };

    let redirect = client.checkout().start_upgrade(&origin).await?;
    println!("Complete payment at: {}", redirect.checkout_url);
    println!("Then run: popflix payment-status {} --confirm", redirect.session_id);
    Ok(())
}

/// Print a checkout's status, refreshing the profile when confirming.
pub async fn status(
    client: &PopflixClient,
    session_id: &str,
    confirm: bool,
) -> Result<(), ClientError> {
    let session_id = CheckoutSessionId::new(session_id);
    let status = if confirm {
        client.checkout().confirm_upgrade(&session_id).await?
    } else {
        client.checkout().payment_status(&session_id).await?
    };

    let amount = status
        .amount
        .map(|price| format!(" ({})", price.display()))
        .unwrap_or_default();
    println!("Payment {}{amount}", status.payment_state);

    if confirm && status.is_paid() {
        println!("Premium is now active");
    }
    Ok(())
}
