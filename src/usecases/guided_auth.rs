use std::{
    io,
    time::{Duration, Instant},
};

use crate::domain::{
    errors::{SourceError, ValidationError},
    session::{AuthToken, SessionContext},
    user::UserId,
};

const PHONE_DIGITS: usize = 10;
const OTP_DIGITS: usize = 4;
const RESEND_COMMAND: &str = "r";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub phone_attempts: usize,
    pub code_attempts: usize,
    pub resend_cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            phone_attempts: 3,
            code_attempts: 3,
            resend_cooldown: Duration::from_secs(60),
        }
    }
}

/// Result of a successful OTP verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSession {
    pub token: AuthToken,
    pub user_id: Option<UserId>,
}

pub trait OtpAuthClient {
    fn request_otp(&self, phone: u64) -> Result<(), SourceError>;
    fn verify_otp(&self, phone: u64, otp: &str) -> Result<VerifiedSession, SourceError>;
}

pub trait AuthTerminal {
    fn print_line(&mut self, line: &str) -> io::Result<()>;
    fn prompt_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
    fn prompt_secret(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

pub struct StdTerminal;

impl AuthTerminal for StdTerminal {
    fn print_line(&mut self, line: &str) -> io::Result<()> {
        println!("{line}");
        Ok(())
    }

    fn prompt_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        use std::io::Write;

        print!("{prompt}");
        io::stdout().flush()?;

        let mut line = String::new();
        let bytes = io::stdin().read_line(&mut line)?;
        if bytes == 0 {
            return Ok(None);
        }

        Ok(Some(line.trim().to_owned()))
    }

    fn prompt_secret(&mut self, prompt: &str) -> io::Result<Option<String>> {
        match rpassword::prompt_password(prompt) {
            Ok(secret) => Ok(Some(secret.trim().to_owned())),
            Err(source) if source.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(source) => Err(source),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuidedAuthOutcome {
    Authenticated(SessionContext),
    ExitWithGuidance,
}

pub fn run_guided_auth(
    terminal: &mut dyn AuthTerminal,
    auth_client: &dyn OtpAuthClient,
    retry_policy: &RetryPolicy,
) -> io::Result<GuidedAuthOutcome> {
    terminal.print_line("Sign in to Convoo with your phone number.")?;

    let Some(phone) = collect_phone(terminal, retry_policy.phone_attempts)? else {
        return Ok(GuidedAuthOutcome::ExitWithGuidance);
    };

    if !request_otp(terminal, auth_client, phone, retry_policy.phone_attempts)? {
        return Ok(GuidedAuthOutcome::ExitWithGuidance);
    }

    let Some(verified) = collect_otp(terminal, auth_client, phone, retry_policy)? else {
        return Ok(GuidedAuthOutcome::ExitWithGuidance);
    };

    tracing::info!(
        user_id_known = verified.user_id.is_some(),
        "otp verification succeeded"
    );
    terminal.print_line("Signed in successfully.")?;

    Ok(GuidedAuthOutcome::Authenticated(SessionContext::new(
        verified.token,
        verified.user_id,
    )))
}

/// Accepts 10 digits, ignoring spaces and dashes.
pub fn parse_phone(input: &str) -> Result<u64, ValidationError> {
    let digits: String = input
        .chars()
        .filter(|ch| !matches!(ch, ' ' | '-'))
        .collect();

    if digits.len() != PHONE_DIGITS || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(ValidationError::InvalidPhone);
    }

    digits.parse().map_err(|_| ValidationError::InvalidPhone)
}

pub fn validate_otp(input: &str) -> Result<&str, ValidationError> {
    let code = input.trim();
    if code.len() != OTP_DIGITS || !code.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(ValidationError::InvalidOtp);
    }

    Ok(code)
}

fn collect_phone(terminal: &mut dyn AuthTerminal, attempts: usize) -> io::Result<Option<u64>> {
    for attempt in 1..=attempts {
        terminal.print_line("Step 1/2: enter your 10-digit phone number.")?;
        let Some(input) = terminal.prompt_line("Phone: ")? else {
            terminal.print_line("Input cancelled (EOF). Run `convoo login` again to retry.")?;
            return Ok(None);
        };

        match parse_phone(&input) {
            Ok(phone) => return Ok(Some(phone)),
            Err(error) => {
                terminal.print_line(&format!(
                    "AUTH_INVALID_PHONE: {error}. Attempts left: {}",
                    attempts.saturating_sub(attempt)
                ))?;
            }
        }
    }

    terminal.print_line("Phone step failed too many times. Please try again later.")?;
    Ok(None)
}

fn request_otp(
    terminal: &mut dyn AuthTerminal,
    auth_client: &dyn OtpAuthClient,
    phone: u64,
    attempts: usize,
) -> io::Result<bool> {
    for attempt in 1..=attempts {
        match auth_client.request_otp(phone) {
            Ok(()) => {
                terminal.print_line("A verification code has been sent to your phone.")?;
                return Ok(true);
            }
            Err(error) => {
                let attempts_left = attempts.saturating_sub(attempt);
                if !handle_backend_error(terminal, error, "Failed to send OTP", attempts_left)? {
                    return Ok(false);
                }
            }
        }
    }

    terminal.print_line("Unable to send a verification code. Please try again later.")?;
    Ok(false)
}

fn collect_otp(
    terminal: &mut dyn AuthTerminal,
    auth_client: &dyn OtpAuthClient,
    phone: u64,
    retry_policy: &RetryPolicy,
) -> io::Result<Option<VerifiedSession>> {
    let attempts = retry_policy.code_attempts;
    let mut resend_available_at = Instant::now() + retry_policy.resend_cooldown;
    let mut attempt = 0;

    while attempt < attempts {
        terminal.print_line(&format!(
            "Step 2/2: enter the {OTP_DIGITS}-digit code, or `{RESEND_COMMAND}` to resend it."
        ))?;
        let Some(input) = terminal.prompt_secret("Code: ")? else {
            terminal.print_line("Input cancelled (EOF). Run `convoo login` again to retry.")?;
            return Ok(None);
        };

        if input.eq_ignore_ascii_case(RESEND_COMMAND) {
            let now = Instant::now();
            if now < resend_available_at {
                let wait = resend_available_at.duration_since(now).as_secs().max(1);
                terminal.print_line(&format!("You can resend the code in {wait}s."))?;
                continue;
            }

            if !request_otp(terminal, auth_client, phone, 1)? {
                return Ok(None);
            }
            resend_available_at = Instant::now() + retry_policy.resend_cooldown;
            continue;
        }

        attempt += 1;
        let attempts_left = attempts.saturating_sub(attempt);

        let code = match validate_otp(&input) {
            Ok(code) => code,
            Err(error) => {
                terminal.print_line(&format!(
                    "AUTH_INVALID_OTP: {error}. Attempts left: {attempts_left}"
                ))?;
                continue;
            }
        };

        match auth_client.verify_otp(phone, code) {
            Ok(verified) => return Ok(Some(verified)),
            Err(error) => {
                if !handle_backend_error(terminal, error, "Invalid OTP", attempts_left)? {
                    return Ok(None);
                }
            }
        }
    }

    terminal.print_line("Code step failed too many times. Run `convoo login` again.")?;
    Ok(None)
}

/// Prints guidance for a failed auth call. Returns whether another attempt makes sense.
fn handle_backend_error(
    terminal: &mut dyn AuthTerminal,
    error: SourceError,
    fallback_message: &str,
    attempts_left: usize,
) -> io::Result<bool> {
    tracing::warn!(error = ?error, attempts_left, "auth request failed");

    match error {
        SourceError::Network(_) => {
            terminal.print_line(&format!(
                "AUTH_NETWORK: Network error. Please try again. Attempts left: {attempts_left}"
            ))?;
            Ok(attempts_left > 0)
        }
        SourceError::Rejected { status: 429, .. } => {
            terminal.print_line(
                "AUTH_RATE_LIMITED: Too many attempts. Wait a few minutes before retrying.",
            )?;
            Ok(false)
        }
        SourceError::Rejected { message, .. } => {
            let message = message
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| fallback_message.to_owned());
            terminal.print_line(&format!(
                "AUTH_REJECTED: {message}. Attempts left: {attempts_left}"
            ))?;
            Ok(attempts_left > 0)
        }
        SourceError::InvalidData(_) | SourceError::MissingToken => {
            terminal.print_line(&format!(
                "AUTH_TRANSIENT: unexpected server response. Attempts left: {attempts_left}"
            ))?;
            Ok(attempts_left > 0)
        }
    }
}
