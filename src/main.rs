use anyhow::Result;
use log::{info, warn, error};
use clap::Parser;

mod config;
mod digest;
mod extractor;
mod imap_client;
mod llm;
mod pipeline;
mod smtp_client;

use config::Config;
use imap_client::ImapClient;
use pipeline::DigestPipeline;
use smtp_client::DigestSender;

#[derive(Parser)]
#[command(name = "lingodigest")]
#[command(about = "Transforme les newsletters non lues en un digest dans la langue cible")]
#[command(version = "0.1.0")]
struct Args {
    /// Mode dry-run : extrait les articles sans appel LLM ni envoi
    #[arg(short, long)]
    dry_run: bool,

    /// Mode daemon : lance le programme en mode daemon avec scheduling
    #[arg(long)]
    daemon: bool,

    /// Limite du nombre d'emails à traiter (par défaut: BATCH_SIZE)
    #[arg(short = 'l', long)]
    limit: Option<usize>,

    /// Vérifier la configuration sans se connecter
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger le fichier .env s'il existe
    dotenv::dotenv().ok();

    // Parser les arguments CLI
    let args = Args::parse();

    // Initialiser le logging
    env_logger::init();

    if args.dry_run {
        info!("🧪 Démarrage en mode DRY-RUN de lingodigest");
    } else {
        info!("🚀 Démarrage de lingodigest");
    }

    // Charger la configuration
    let config = Config::new()?;

    // Si demandé, vérifier seulement la configuration
    if args.check_config {
        println!("✅ Configuration valide !");
        println!("📧 IMAP: {}@{}:{}", config.imap.username, config.imap.server, config.imap.port);
        println!("📤 SMTP: {}:{} → {}", config.smtp.server, config.smtp.port, config.smtp.recipient);
        println!("🤖 LLM: {:?} (modèle: {})",
                 config.llm.provider,
                 config.llm.model.as_deref().unwrap_or("(défaut)"));
        println!("🗣️  Langue: {} → {} (niveau {})",
                 config.language.known, config.language.target, config.language.level);
        println!("📦 Taille de lot: {} emails, timeout: {}s",
                 config.batch_size, config.run_timeout_secs);
        return Ok(());
    }

    // Si le mode daemon est activé
    if args.daemon {
        info!("🔄 Démarrage en mode daemon");
        run_daemon_mode(config, args).await?;
        return Ok(());
    }

    // Mode one-shot (comportement par défaut)
    match run_once(&config, args.dry_run, args.limit).await {
        Ok(count) => {
            if args.dry_run {
                info!("✅ Analyse dry-run terminée avec succès. {} emails analysés.", count);
            } else {
                info!("✅ Traitement terminé avec succès. {} emails traités.", count);
            }
        }
        Err(e) => {
            error!("❌ Erreur lors du traitement des emails: {}", e);
            return Err(e);
        }
    }

    Ok(())
}

/// One complete cycle: fetch, pipeline, deliver, then mark the safe
/// messages processed. Nothing is marked if delivery fails.
async fn run_once(config: &Config, dry_run: bool, limit: Option<usize>) -> Result<usize> {
    // 1. Se connecter au serveur IMAP
    let mut imap_client = ImapClient::new(&config.imap).await?;

    // 2. Récupérer le lot d'emails non lus
    let batch_limit = limit.unwrap_or(config.batch_size);
    let batch = match imap_client.fetch_unprocessed(batch_limit).await {
        Ok(batch) => batch,
        Err(e) => {
            let _ = imap_client.logout().await;
            return Err(e);
        }
    };

    if batch.is_empty() {
        info!("Aucun email non lu, rien à faire");
        imap_client.logout().await?;
        return Ok(0);
    }

    // 3. En mode dry-run : extraction seulement, pas d'appel LLM ni d'envoi
    if dry_run {
        let count = batch.len();
        print_dry_run_report(&batch);
        imap_client.logout().await?;
        return Ok(count);
    }

    // 4. Dérouler le pipeline sous timeout global
    let client = llm::create_generation_client(&config.llm);
    let digest_pipeline = DigestPipeline::new(config.language.clone(), client);

    let report = match digest_pipeline
        .run_with_timeout(&batch, config.run_timeout_secs)
        .await
    {
        Ok(report) => report,
        Err(e) => {
            // Échec total : rien n'est envoyé, rien n'est marqué traité
            error!("❌ Pipeline en échec total, la boîte source reste intacte: {}", e);
            imap_client.logout().await?;
            anyhow::bail!("Pipeline failure: {}", e);
        }
    };

    for (uid, reason) in report.result.failed() {
        warn!("Email {} exclu du digest: {}", uid, reason);
    }

    // 5. Livrer le digest (même partiel)
    let sender = DigestSender::new(&config.smtp)?;
    if let Err(e) = sender.send_digest(&report.digest).await {
        error!("❌ Envoi du digest impossible, aucun email ne sera marqué traité: {}", e);
        imap_client.logout().await?;
        return Err(e);
    }

    // 6. Cleanup : marquer traités uniquement les emails "safe",
    //    seulement après livraison confirmée
    let safe_uids = report.result.safe_uids();
    let mut marked = 0;
    for uid in &safe_uids {
        match imap_client.mark_message_processed(*uid).await {
            Ok(()) => marked += 1,
            Err(e) => {
                // L'email restera non lu et sera retraité au prochain cycle
                error!("Impossible de marquer l'email {} comme traité: {}", uid, e);
            }
        }
    }

    // 7. Se déconnecter proprement
    imap_client.logout().await?;

    info!(
        "Traitement terminé: {} articles dans le digest, {} emails marqués traités sur {}",
        report.digest.articles.len(),
        marked,
        batch.len()
    );

    Ok(marked)
}

fn print_dry_run_report(batch: &[imap_client::SourceMessage]) {
    println!("\n{}", "=".repeat(80));
    println!("🧪 MODE DRY-RUN - EXTRACTION DES NEWSLETTERS");
    println!("{}", "=".repeat(80));

    for (index, message) in batch.iter().enumerate() {
        println!("📧 Email {}/{} (ID: {})", index + 1, batch.len(), message.uid);
        println!("   Objet: {}", message.subject);
        println!("   Date: {}", message.date.format("%Y-%m-%d %H:%M:%S UTC"));

        let articles = extractor::extract_articles(message);
        if articles.is_empty() {
            println!("   ⚠️  Aucun contenu exploitable (sera ignoré)\n");
            continue;
        }

        println!("   ✅ {} article(s) extrait(s):", articles.len());
        for article in &articles {
            let preview: String = article.body.chars().take(80).collect();
            println!("      {}. {} ({} caractères)", article.index + 1, preview, article.body.len());
        }
        println!();
    }

    println!("{}", "=".repeat(80));
    println!("🏁 Analyse terminée: {} emails analysés", batch.len());
    println!("{}", "=".repeat(80));
}

async fn run_daemon_mode(config: Config, args: Args) -> Result<()> {
    use tokio_cron_scheduler::{JobScheduler, Job};
    use chrono::{Local, Timelike};

    // Vérifier que le scheduler est activé dans la configuration
    if !config.scheduler.enabled {
        error!("❌ Le mode daemon nécessite SCHEDULER_ENABLED=true dans la configuration");
        anyhow::bail!("Scheduler non activé dans la configuration");
    }

    if config.scheduler.schedule_times.is_empty() {
        error!("❌ Aucun horaire de scheduling défini (SCHEDULER_TIMES)");
        anyhow::bail!("Aucun horaire de scheduling défini");
    }

    info!("📅 Horaires de génération configurés : {:?}", config.scheduler.schedule_times);

    // Créer le scheduler
    let scheduler = JobScheduler::new().await?;

    // Ajouter un job pour chaque horaire configuré
    for schedule_time in &config.scheduler.schedule_times {
        let parts: Vec<&str> = schedule_time.split(':').collect();
        if parts.len() != 2 {
            error!("❌ Format d'horaire invalide: {}. Utilisez le format HH:MM", schedule_time);
            continue;
        }

        let hour = parts[0];
        let minute = parts[1];

        // Format cron: "0 minute hour * * *" (tous les jours)
        let cron_expr = format!("0 {} {} * * *", minute, hour);
        info!("📆 Ajout du job planifié : {} (cron: {})", schedule_time, cron_expr);

        // Cloner les variables nécessaires pour le closure
        let config_clone = config.clone();
        let dry_run = args.dry_run;
        let limit = args.limit;
        let schedule_time_clone = schedule_time.clone();

        let job = Job::new_async(cron_expr.as_str(), move |_uuid, _l| {
            let config = config_clone.clone();
            let schedule_time = schedule_time_clone.clone();

            Box::pin(async move {
                info!("⏰ Exécution planifiée à {} - Génération du digest...", schedule_time);

                match run_once(&config, dry_run, limit).await {
                    Ok(count) => {
                        info!("✅ Traitement planifié terminé. {} emails traités à {}", count, schedule_time);
                    }
                    Err(e) => {
                        error!("❌ Erreur lors du traitement planifié à {}: {}", schedule_time, e);
                    }
                }
            })
        })?;

        scheduler.add(job).await?;
    }

    // Démarrer le scheduler
    scheduler.start().await?;

    info!("✅ Mode daemon démarré. En attente des horaires planifiés...");
    info!("📋 Prochaines exécutions : {:?}", config.scheduler.schedule_times);
    info!("⏸️  Appuyez sur Ctrl+C pour arrêter le daemon");

    // Garder le programme en vie
    loop {
        tokio::time::sleep(tokio::time::Duration::from_secs(60)).await;

        // Log périodique pour montrer que le daemon est actif
        let now = Local::now();
        if now.minute() == 0 {
            info!("💓 Daemon actif - {}", now.format("%Y-%m-%d %H:%M"));
        }
    }
}
