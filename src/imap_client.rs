use anyhow::{Result, Context};
use async_imap::Session;
use async_native_tls::{TlsConnector, TlsStream};
use tokio::net::TcpStream;
use futures::stream::StreamExt;
use log::{info, debug, warn};

use crate::config::ImapConfig;

/// Email source non traité, tel que récupéré de la boîte aux lettres.
/// Le pipeline le lit sans jamais le modifier.
pub struct SourceMessage {
    pub uid: u32,
    pub raw: Vec<u8>,
    pub date: chrono::DateTime<chrono::Utc>,
    pub subject: String,
}

pub struct ImapClient {
    session: Session<TlsStream<TcpStream>>,
}

impl ImapClient {
    pub async fn new(config: &ImapConfig) -> Result<Self> {
        info!("Connexion au serveur IMAP {}:{}", config.server, config.port);

        // Créer une connexion TCP
        let tcp_stream = TcpStream::connect((config.server.as_str(), config.port))
            .await
            .context("Impossible de se connecter au serveur IMAP")?;

        // Créer une connexion TLS
        let tls = TlsConnector::new();
        let tls_stream = tls.connect(&config.server, tcp_stream)
            .await
            .context("Impossible d'établir la connexion TLS")?;

        // Créer le client IMAP avec async-imap
        let client = async_imap::Client::new(tls_stream);

        // Authentification
        let session = client
            .login(&config.username, &config.password)
            .await
            .map_err(|e| anyhow::anyhow!("Erreur d'authentification IMAP: {:?}", e.0))?;

        info!("Connexion IMAP établie avec succès");

        Ok(ImapClient { session })
    }

    /// Récupère le lot courant d'emails non lus, dans l'ordre d'arrivée.
    /// Les messages illisibles sont ignorés avec un warning, jamais fatals.
    pub async fn fetch_unprocessed(&mut self, limit: usize) -> Result<Vec<SourceMessage>> {
        info!("Recherche des newsletters non lues dans INBOX");

        // Sélectionner la boîte aux lettres
        self.session.select("INBOX")
            .await
            .context("Impossible de sélectionner INBOX")?;

        let message_ids = self.session
            .search("UNSEEN")
            .await
            .context("Erreur lors de la recherche des emails non lus")?;

        // L'ordre d'arrivée correspond aux numéros de séquence croissants
        let mut ids_vec: Vec<u32> = message_ids.into_iter().collect();
        ids_vec.sort_unstable();

        if ids_vec.len() > limit {
            info!(
                "Trouvé {} email(s) non lu(s), limité au lot de {} (le reste attend le prochain cycle)",
                ids_vec.len(), limit
            );
            ids_vec.truncate(limit);
        } else {
            info!("Trouvé {} email(s) non lu(s)", ids_vec.len());
        }

        let mut messages = Vec::new();
        for id in ids_vec {
            match self.fetch_single_message(id).await {
                Ok(message) => messages.push(message),
                Err(e) => {
                    warn!("Email {} ignoré (récupération impossible): {}", id, e);
                }
            }
        }

        Ok(messages)
    }

    async fn fetch_single_message(&mut self, message_id: u32) -> Result<SourceMessage> {
        debug!("Récupération complète de l'email ID: {}", message_id);

        // BODY.PEEK[] pour ne pas positionner \Seen lors de la lecture :
        // seul le cleanup post-livraison marque les emails comme traités
        let messages_stream = self.session
            .fetch(message_id.to_string(), "BODY.PEEK[]")
            .await
            .context("Impossible de récupérer l'email")?;

        // Collecter le stream en vec
        let messages: Vec<_> = messages_stream
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .filter_map(|r| r.ok())
            .collect();

        if let Some(message) = messages.first() {
            if let Some(body) = message.body() {
                debug!("Email récupéré, taille: {} bytes", body.len());

                // Parse le contenu avec mail-parser pour extraire date et objet
                if let Some(parsed_email) = mail_parser::MessageParser::default().parse(body) {
                    let email_date = if let Some(date_header) = parsed_email.date() {
                        chrono::DateTime::from_timestamp(date_header.to_timestamp(), 0)
                            .map(|dt| dt.with_timezone(&chrono::Utc))
                            .unwrap_or_else(chrono::Utc::now)
                    } else {
                        warn!("Pas de date dans l'email {}, utilisation de la date courante", message_id);
                        chrono::Utc::now()
                    };

                    let subject = parsed_email.subject()
                        .unwrap_or("Sans objet")
                        .to_string();

                    return Ok(SourceMessage {
                        uid: message_id,
                        raw: body.to_vec(),
                        date: email_date,
                        subject,
                    });
                }

                // Fallback : conserver le contenu brut si le parsing échoue
                warn!("Impossible de parser l'email avec mail-parser, utilisation du fallback");
                return Ok(SourceMessage {
                    uid: message_id,
                    raw: body.to_vec(),
                    date: chrono::Utc::now(),
                    subject: "Sans objet".to_string(),
                });
            }
        }

        anyhow::bail!("Email introuvable ou vide pour l'ID: {}", message_id);
    }

    /// Marque un email comme traité (flag \Seen).
    /// Appelé uniquement après livraison confirmée du digest, et uniquement
    /// pour les emails dont tous les articles ont été transformés.
    pub async fn mark_message_processed(&mut self, message_id: u32) -> Result<()> {
        info!("Marquage de l'email {} comme traité", message_id);

        // S'assurer que nous sommes dans INBOX
        self.session.select("INBOX")
            .await
            .context("Impossible de sélectionner INBOX")?;

        let store_stream = self.session
            .store(format!("{}", message_id), "+FLAGS (\\Seen)")
            .await
            .context("Impossible de marquer l'email comme lu")?;

        // Consommer le stream (nécessaire pour que l'opération soit effectuée)
        let _results: Vec<_> = store_stream.collect::<Vec<_>>().await;

        info!("✅ Email {} marqué comme traité", message_id);
        Ok(())
    }

    pub async fn logout(mut self) -> Result<()> {
        info!("Déconnexion du serveur IMAP");
        self.session.logout()
            .await
            .context("Erreur lors de la déconnexion IMAP")?;
        Ok(())
    }
}
