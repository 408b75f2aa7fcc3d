//! Email bodies.
//!
//! Product emails are in French. Amounts are FCFA with the French
//! thousands grouping.

/// Group digits the fr-FR way, with non-breaking spaces left out on
/// purpose so the strings stay plain ASCII apart from the copy itself.
pub fn format_fcfa(amount: i64) -> String {
    let digits = amount.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }
    if amount < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

pub struct EmailContent {
    pub subject: String,
    pub html: String,
}

/// Receipt confirmation sent to the tenant once their rent is settled.
pub fn rent_receipt(
    tenant_name: &str,
    amount: i64,
    period_month: i64,
    period_year: i64,
) -> EmailContent {
    let amount_fmt = format_fcfa(amount);
    EmailContent {
        subject: format!("Reçu de paiement - Loyer {period_month}/{period_year}"),
        html: format!(
            "<h1>Paiement reçu !</h1>\
             <p>Bonjour {tenant_name},</p>\
             <p>Nous confirmons la réception de votre paiement de <strong>{amount_fmt} FCFA</strong> \
             pour le loyer de <strong>{period_month}/{period_year}</strong>.</p>\
             <p>Votre quittance est désormais disponible dans votre espace locataire.</p>\
             <br/><p>Cordialement,<br/>L'équipe Keurimmo</p>"
        ),
    }
}

/// Notice sent to the owner when a tenant's payment lands.
pub fn owner_payment_notice(tenant_name: &str, amount: i64) -> EmailContent {
    let amount_fmt = format_fcfa(amount);
    EmailContent {
        subject: format!("[Paiement] Loyer reçu - {tenant_name}"),
        html: format!(
            "<p>Le locataire {tenant_name} a réglé son loyer de {amount_fmt} FCFA via PayDunya.</p>"
        ),
    }
}

/// Magic link inviting a tenant into their portal.
pub fn magic_link(tenant_name: &str, link: &str) -> EmailContent {
    EmailContent {
        subject: "Accédez à votre espace locataire".to_string(),
        html: format!(
            "<h1>Votre espace locataire</h1>\
             <p>Bonjour {tenant_name},</p>\
             <p>Cliquez sur le lien ci-dessous pour accéder à votre espace locataire. \
             Ce lien est valable 7 jours.</p>\
             <p><a href=\"{link}\">Accéder à mon espace</a></p>\
             <br/><p>Cordialement,<br/>L'équipe Keurimmo</p>"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fcfa_grouping() {
        assert_eq!(format_fcfa(0), "0");
        assert_eq!(format_fcfa(950), "950");
        assert_eq!(format_fcfa(250_000), "250 000");
        assert_eq!(format_fcfa(1_234_567), "1 234 567");
        assert_eq!(format_fcfa(-45_000), "-45 000");
    }

    #[test]
    fn test_receipt_mentions_amount_and_period() {
        let email = rent_receipt("Awa Diop", 250_000, 3, 2025);
        assert!(email.subject.contains("3/2025"));
        assert!(email.html.contains("250 000 FCFA"));
        assert!(email.html.contains("Awa Diop"));
    }
}
