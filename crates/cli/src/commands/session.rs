//! Session commands.

use popflix_client::{ClientError, PopflixClient};
use popflix_core::Session;

fn print_session(session: &Session) {
    match session.user() {
        Some(user) => {
            let plan = if user.is_premium { "Premium" } else { "Free" };
            let email = user.email.as_deref().unwrap_or("no email");
            println!("{} <{email}> - {plan}", user.name);
        }
        None => println!("Not signed in"),
    }
}

/// Show the restored session.
pub fn whoami(client: &PopflixClient) {
    print_session(&client.session().session());
}

/// Exchange a credential for a session.
pub async fn login(client: &PopflixClient, credential: &str) -> Result<(), ClientError> {
    let session = client.session().login(credential).await?;
    print_session(&session);
    Ok(())
}

/// Forget the stored session.
pub fn logout(client: &PopflixClient) {
    client.session().logout();
    println!("Signed out");
}
