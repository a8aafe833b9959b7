//! Interactive numeric menu over the Graph client.
//!
//! The shell owns nothing but its input and output streams; the Graph client
//! is borrowed from `main` and lives for the whole session. Operation failures
//! are printed and the menu continues, bad input always re-prompts.

use std::fmt::Display;
use std::io::{self, BufRead, Write};

use chrono::Local;
use graphmail_core::{GraphClient, MessagePage, OutgoingMessage, UserSummary, decode_claims};

const INDENT: &str = "    ";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %:z";
const INVALID_CHOICE: &str = "Invalid choice! Please try again.";

const MENU: [&str; 5] = [
    "0. Exit",
    "1. Display access token",
    "2. List users",
    "3. Read mail",
    "4. Send mail",
];

/// One parsed line of menu input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    Number(i64),
    Invalid,
    Eof,
}

/// Menu loop reading choices from `R` and writing to `W`.
#[derive(Debug)]
pub struct Shell<'a, R, W> {
    client: &'a GraphClient,
    input: R,
    output: W,
}

impl<'a, R: BufRead, W: Write> Shell<'a, R, W> {
    /// Create a shell over an initialized client.
    pub const fn new(client: &'a GraphClient, input: R, output: W) -> Self {
        Self {
            client,
            input,
            output,
        }
    }

    /// Run until the user picks `0` or input ends.
    ///
    /// # Errors
    ///
    /// Returns an error only if reading input or writing output fails.
    pub async fn run(&mut self) -> io::Result<()> {
        loop {
            self.print_menu()?;

            match self.read_selection()? {
                Selection::Eof => {
                    log::debug!("input closed, leaving menu");
                    return Ok(());
                }
                Selection::Number(0) => {
                    writeln!(self.output, "Goodbye...")?;
                    return Ok(());
                }
                Selection::Number(1) => self.display_access_token().await?,
                Selection::Number(2) => self.list_users().await?,
                Selection::Number(3) => self.read_inbox().await?,
                Selection::Number(4) => self.send_mail().await?,
                Selection::Number(_) | Selection::Invalid => {
                    writeln!(self.output, "{INVALID_CHOICE}")?;
                }
            }
        }
    }

    fn print_menu(&mut self) -> io::Result<()> {
        writeln!(self.output, "Please choose one of the following options:")?;
        for line in MENU {
            writeln!(self.output, "{line}")?;
        }
        Ok(())
    }

    async fn display_access_token(&mut self) -> io::Result<()> {
        let token = match self.client.app_token().await {
            Ok(token) => token,
            Err(e) => return self.report("", "Error getting app token", &e),
        };

        writeln!(self.output, "App-only token: {}", token.secret)?;
        if let Ok(claims) = decode_claims(&token.secret) {
            if let Some(name) = claims.app_display_name {
                writeln!(self.output, "{INDENT}App: {name}")?;
            }
            if !claims.roles.is_empty() {
                writeln!(self.output, "{INDENT}Roles: {}", claims.roles.join(", "))?;
            }
        }
        writeln!(
            self.output,
            "{INDENT}Expires: {}",
            token.expires_at.with_timezone(&Local).format(TIME_FORMAT)
        )
    }

    async fn list_users(&mut self) -> io::Result<()> {
        if let Some(users) = self.fetch_users("").await? {
            if users.is_empty() {
                writeln!(self.output, "No users found.")?;
            }
            self.print_users(&users, "")?;
        }
        Ok(())
    }

    async fn read_inbox(&mut self) -> io::Result<()> {
        let Some(users) = self.fetch_users(INDENT).await? else {
            return Ok(());
        };
        let Some(user) =
            self.choose_user(&users, "Please choose one of the following users:")?
        else {
            return Ok(());
        };

        writeln!(self.output)?;
        writeln!(self.output)?;

        match self.client.list_inbox(&user.id).await {
            Ok(page) => self.print_inbox(&page),
            Err(e) => self.report(INDENT, "Error getting user's inbox", &e),
        }
    }

    async fn send_mail(&mut self) -> io::Result<()> {
        let Some(users) = self.fetch_users(INDENT).await? else {
            return Ok(());
        };
        let Some(user) = self.choose_user(
            &users,
            "Please choose one of the following users on whose behalf you want to send a mail:",
        )?
        else {
            return Ok(());
        };

        let Some(subject) = self.prompt("Please enter the subject of the mail:")? else {
            return Ok(());
        };
        let Some(body) = self.prompt("Please enter the body of the mail:")? else {
            return Ok(());
        };
        let Some(recipient) = self.prompt("Please enter the recipient's email address:")? else {
            return Ok(());
        };

        writeln!(self.output)?;
        writeln!(self.output)?;

        let message = OutgoingMessage::new(subject, body, recipient.trim());
        match self.client.send_mail(&user.id, &message).await {
            Ok(()) => writeln!(self.output, "{INDENT}Mail successfully sent!"),
            Err(e) => self.report(INDENT, "Error sending mail", &e),
        }
    }

    /// Fetch users, printing the failure instead of returning it.
    async fn fetch_users(&mut self, indent: &str) -> io::Result<Option<Vec<UserSummary>>> {
        match self.client.list_users().await {
            Ok(users) => Ok(Some(users)),
            Err(e) => {
                self.report(indent, "Error getting users", &e)?;
                Ok(None)
            }
        }
    }

    /// Prompt for a 1-based user index until a valid one is entered.
    fn choose_user(
        &mut self,
        users: &[UserSummary],
        prompt: &str,
    ) -> io::Result<Option<UserSummary>> {
        if users.is_empty() {
            writeln!(self.output, "{INDENT}No users available.")?;
            return Ok(None);
        }

        loop {
            writeln!(self.output)?;
            writeln!(self.output, "{INDENT}{prompt}")?;
            self.print_users(users, INDENT)?;

            match self.read_selection()? {
                Selection::Eof => return Ok(None),
                Selection::Number(n) => {
                    if let Some(user) = usize::try_from(n)
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .and_then(|idx| users.get(idx))
                    {
                        return Ok(Some(user.clone()));
                    }
                    writeln!(self.output, "{INDENT}{INVALID_CHOICE}")?;
                }
                Selection::Invalid => writeln!(self.output, "{INDENT}{INVALID_CHOICE}")?,
            }
        }
    }

    fn print_users(&mut self, users: &[UserSummary], indent: &str) -> io::Result<()> {
        for (idx, user) in users.iter().enumerate() {
            writeln!(self.output, "{indent}{}. User: {}", idx + 1, user.display_name)?;
            writeln!(self.output, "{indent}  ID: {}", user.id)?;
            writeln!(self.output, "{indent}  Email: {}", user.email)?;
        }
        Ok(())
    }

    fn print_inbox(&mut self, page: &MessagePage) -> io::Result<()> {
        for message in &page.messages {
            let subject = if message.subject.is_empty() {
                "(no subject)"
            } else {
                &message.subject
            };
            let from = message.sender_display_name.as_deref().unwrap_or("Unknown");
            let received = message.received_at.map_or_else(
                || "Unknown".to_string(),
                |t| t.format(TIME_FORMAT).to_string(),
            );

            writeln!(self.output, "{INDENT}Message: {subject}")?;
            writeln!(self.output, "{INDENT}  From: {from}")?;
            writeln!(self.output, "{INDENT}  Status: {}", message.status())?;
            writeln!(self.output, "{INDENT}  Received: {received}")?;
        }

        writeln!(self.output)?;
        writeln!(
            self.output,
            "{INDENT}More messages available? {}",
            page.has_next_page()
        )?;
        writeln!(self.output)
    }

    fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        writeln!(self.output, "{INDENT}{label}")?;
        self.read_line()
    }

    fn report(&mut self, indent: &str, context: &str, err: &dyn Display) -> io::Result<()> {
        log::debug!("{context}: {err}");
        writeln!(self.output, "{indent}{context}: {err}")
    }

    fn read_selection(&mut self) -> io::Result<Selection> {
        Ok(match self.read_line()? {
            None => Selection::Eof,
            Some(line) => line
                .trim()
                .parse()
                .map_or(Selection::Invalid, Selection::Number),
        })
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphmail_core::{Credentials, GraphConfig};
    use serde_json::json;
    use std::io::Cursor;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_client(server: &MockServer) -> GraphClient {
        Mock::given(method("POST"))
            .and(path("/tenant/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "expires_in": 3599,
                "access_token": "test-token"
            })))
            .mount(server)
            .await;

        let credentials = Credentials {
            tenant_id: "tenant".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
        };
        let config = GraphConfig {
            authority_url: server.uri(),
            base_url: format!("{}/v1.0", server.uri()),
            ..GraphConfig::default()
        };
        GraphClient::new(credentials, &config).unwrap()
    }

    async fn mount_users(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v1.0/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    { "id": "u1", "displayName": "Adele Vance", "mail": "adele@contoso.com" },
                    { "id": "u2", "displayName": "Shared Mailbox" }
                ]
            })))
            .mount(server)
            .await;
    }

    async fn run_with(client: &GraphClient, input: &str) -> String {
        let mut shell = Shell::new(client, Cursor::new(input.as_bytes()), Vec::new());
        shell.run().await.unwrap();
        String::from_utf8(shell.output).unwrap()
    }

    fn menu_count(output: &str) -> usize {
        output
            .matches("Please choose one of the following options:")
            .count()
    }

    #[tokio::test]
    async fn non_numeric_input_redisplays_menu() {
        let server = MockServer::start().await;
        let client = mock_client(&server).await;

        let output = run_with(&client, "abc\n0\n").await;
        assert_eq!(menu_count(&output), 2);
        assert!(output.contains(INVALID_CHOICE));
        assert!(output.trim_end().ends_with("Goodbye..."));
    }

    #[tokio::test]
    async fn out_of_range_choice_redisplays_menu() {
        let server = MockServer::start().await;
        let client = mock_client(&server).await;

        let output = run_with(&client, "7\n-1\n0\n").await;
        assert_eq!(menu_count(&output), 3);
        assert_eq!(output.matches(INVALID_CHOICE).count(), 2);
    }

    #[tokio::test]
    async fn end_of_input_leaves_menu() {
        let server = MockServer::start().await;
        let client = mock_client(&server).await;

        let output = run_with(&client, "").await;
        assert_eq!(menu_count(&output), 1);
        assert!(!output.contains("Goodbye..."));
    }

    #[tokio::test]
    async fn displays_token() {
        let server = MockServer::start().await;
        let client = mock_client(&server).await;

        let output = run_with(&client, "1\n0\n").await;
        assert!(output.contains("App-only token: test-token"));
        assert!(output.contains("Expires: "));
    }

    #[tokio::test]
    async fn lists_users_with_placeholder() {
        let server = MockServer::start().await;
        let client = mock_client(&server).await;
        mount_users(&server).await;

        let output = run_with(&client, "2\n0\n").await;
        assert!(output.contains("1. User: Adele Vance"));
        assert!(output.contains("  ID: u1"));
        assert!(output.contains("2. User: Shared Mailbox"));
        assert!(output.contains("  Email: NO EMAIL"));
    }

    #[tokio::test]
    async fn failed_operation_returns_to_menu() {
        let server = MockServer::start().await;
        let client = mock_client(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1.0/users"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let output = run_with(&client, "2\n3\n0\n").await;
        assert_eq!(output.matches("Error getting users").count(), 2);
        assert_eq!(menu_count(&output), 3);
        assert!(output.contains("Goodbye..."));
    }

    #[tokio::test]
    async fn invalid_user_index_reprompts() {
        let server = MockServer::start().await;
        let client = mock_client(&server).await;
        mount_users(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1.0/users/u1/mailFolders/inbox/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{
                    "subject": "Welcome",
                    "from": { "emailAddress": { "name": "Megan Bowen" } },
                    "isRead": true,
                    "receivedDateTime": "2024-02-01T10:00:00Z"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let output = run_with(&client, "3\n0\n3\nx\n1\n0\n").await;
        let prompt = "Please choose one of the following users:";
        assert_eq!(output.matches(prompt).count(), 4);
        assert_eq!(
            output.matches(&format!("{INDENT}{INVALID_CHOICE}")).count(),
            3
        );
        assert!(output.contains("Message: Welcome"));
        assert!(output.contains("From: Megan Bowen"));
        assert!(output.contains("Status: Read"));
        assert!(output.contains("More messages available? false"));
    }

    #[tokio::test]
    async fn end_of_input_in_submenu_aborts_workflow() {
        let server = MockServer::start().await;
        let client = mock_client(&server).await;
        mount_users(&server).await;

        let output = run_with(&client, "3\n").await;
        assert!(output.contains("Please choose one of the following users:"));
        assert!(!output.contains("More messages available?"));
        assert_eq!(menu_count(&output), 2);
    }

    #[tokio::test]
    async fn sends_mail_for_chosen_user() {
        let server = MockServer::start().await;
        let client = mock_client(&server).await;
        mount_users(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1.0/users/u2/sendMail"))
            .and(body_json(json!({
                "message": {
                    "subject": "Test",
                    "body": { "contentType": "text", "content": "Body text" },
                    "toRecipients": [{ "emailAddress": { "address": "a@example.com" } }]
                }
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let output = run_with(&client, "4\n2\nTest\nBody text\na@example.com\n0\n").await;
        assert!(output.contains("Please enter the subject of the mail:"));
        assert!(output.contains("Mail successfully sent!"));
    }
}
