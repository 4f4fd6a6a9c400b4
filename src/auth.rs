use anyhow::{Result, bail};
use std::io::{self, BufRead, IsTerminal};
use zeroize::Zeroizing;

pub const PASSWORD_ENV: &str = "SNIPER_CRYPT_PASSWORD";

/// Reads the password once for the whole run.
///
/// `confirm` asks twice on an interactive terminal, for encryption.
pub fn read_password(confirm: bool) -> Result<Zeroizing<String>> {
    //  Environment Variable
    //  SNIPER_CRYPT_PASSWORD="supersecret" sniper-crypt encrypt notes.txt
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    //  stdin (Pipeline)
    //  echo "supersecret" | sniper-crypt decrypt notes.txt.enc
    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().lock().read_line(&mut buf)?;
        trim_newline(&mut buf);

        if !buf.is_empty() {
            return Ok(buf);
        }
        bail!("No password provided")
    }

    //  Interactive (TTY)
    let pw = Zeroizing::new(rpassword::prompt_password("Password: ")?);
    if pw.is_empty() {
        bail!("password cannot be empty");
    }

    if confirm {
        let again = Zeroizing::new(rpassword::prompt_password("Confirm password: ")?);
        if pw != again {
            bail!("passwords do not match");
        }
    }

    Ok(pw)
}

fn trim_newline(s: &mut String) {
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
}
