use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn};

use sopho_bench::clients::{ClientPool, ModelClient, OpenAiClient};
use sopho_bench::config::Config;
use sopho_bench::error::HarnessResult;
use sopho_bench::infrastructure::{count_rows, open_source, JsonFileSink, ResultSink};
use sopho_bench::models::{AnswerFormat, DatasetProfile, QuestionIdSource, TaskMode};
use sopho_bench::orchestrator::{
    DatasetDriver, PartitionAggregator, RunSummary, TimeoutMode, WorkerPool,
};
use sopho_bench::services::{FieldAdapter, JudgeService};
use sopho_bench::utils::logging::{self, log_startup, LogConfig};
use sopho_bench::workflow::{ItemExecutor, Sampler, TaskStrategy};

#[derive(Parser, Debug)]
#[command(name = "sopho_bench", version, about = "在公开数据集上批量评测大模型")]
struct Cli {
    /// TOML 配置文件，未指定时只读取环境变量
    #[arg(long, global = true, env = "SOPHO_BENCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 运行评测
    Run(RunArgs),
    /// 统计数据集总题数
    Count {
        #[arg(short, long)]
        dataset: String,
    },
    /// 列出内置数据集档案
    Datasets,
    /// 用 LLM 评审答案
    Judge(JudgeArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// 数据集名称（HuggingFace 名称、内置短名或 .json/.jsonl 文件），可重复
    #[arg(short, long = "dataset", required = true, num_args = 1..)]
    datasets: Vec<String>,

    /// 每个分区抽样数量
    #[arg(short = 'n', long)]
    sample_size: Option<usize>,

    /// 最大并发数
    #[arg(short = 't', long)]
    workers: Option<usize>,

    /// 单题超时（秒）
    #[arg(long)]
    timeout: Option<u64>,

    #[arg(long, value_enum)]
    timeout_mode: Option<TimeoutMode>,

    #[arg(long, value_enum)]
    task: Option<TaskMode>,

    /// 抽样随机种子
    #[arg(long)]
    seed: Option<u64>,

    /// 题目 ID 字段，不指定时使用行下标
    #[arg(long)]
    id_field: Option<String>,

    /// 覆盖文本模型
    #[arg(long)]
    model: Option<String>,

    /// 覆盖视觉模型
    #[arg(long)]
    vision_model: Option<String>,

    /// 跳过启动时的模型可用性检查（端点不支持 /models 时使用）
    #[arg(long)]
    skip_model_check: bool,

    // 未内置的数据集通过以下字段描述
    #[arg(long)]
    question_field: Option<String>,

    #[arg(long)]
    options_field: Option<String>,

    #[arg(long)]
    images_field: Option<String>,

    #[arg(long)]
    answer_field: Option<String>,
}

#[derive(Args, Debug)]
struct JudgeArgs {
    #[arg(long)]
    question: String,

    #[arg(long)]
    answer: String,

    /// 提供第二个答案时进行对比评审
    #[arg(long)]
    answer_b: Option<String>,

    /// 自定义评分标准
    #[arg(long)]
    rubric: Option<String>,
}

/// 一个数据集解析后的运行参数
struct DatasetPlan {
    /// 传给数据源的名称
    source_name: String,
    /// 输出文件使用的名称
    output_name: String,
    adapter: FieldAdapter,
    multimodal: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;

    let _guard = logging::init(&LogConfig::from_config(&config))?;

    match cli.command {
        Command::Run(args) => run(config, args).await,
        Command::Count { dataset } => Ok(count(config, &dataset).await?),
        Command::Datasets => {
            list_datasets();
            Ok(())
        }
        Command::Judge(args) => judge(config, args).await,
    }
}

fn load_config(path: Option<&Path>) -> HarnessResult<Config> {
    Ok(match path {
        Some(path) => Config::from_toml_file(path)?,
        None => Config::from_env(),
    })
}

async fn run(config: Config, args: RunArgs) -> Result<()> {
    let config = apply_run_overrides(config, &args).validated();

    let plans: Vec<(String, DatasetPlan)> = args
        .datasets
        .iter()
        .map(|dataset| (dataset.clone(), plan_dataset(dataset, &args)))
        .collect();

    if config.task.needs_model() && !args.skip_model_check {
        let mut models = vec![config.text_model.as_str()];
        if plans.iter().any(|(_, plan)| plan.multimodal) {
            models.push(config.vision_model.as_str());
        }
        OpenAiClient::new(&config)
            .ensure_models_available(&models)
            .await
            .context("模型检查失败，可用 --skip-model-check 跳过")?;
    }

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let clients = if config.task.needs_model() {
        let model_config = config.clone();
        Some(ClientPool::new(move || {
            Ok(Box::new(OpenAiClient::new(&model_config)) as Box<dyn ModelClient>)
        }))
    } else {
        None
    };

    let sink: Arc<dyn ResultSink> = Arc::new(JsonFileSink::new(&config.output_dir));

    let mut failed = Vec::new();
    let mut not_started = Vec::new();
    for (dataset, plan) in plans {
        if cancel.is_cancelled() {
            warn!("🛑 运行已取消，跳过数据集 {}", dataset);
            not_started.push(dataset);
            continue;
        }
        match run_dataset(&config, plan, clients.clone(), Arc::clone(&sink), cancel.clone()).await
        {
            Ok(summary) => match &summary.saved_to {
                Some(path) => info!("✅ {} 完成，结果: {}", dataset, path.display()),
                None => warn!("⚠️ {} 没有产生任何输出", dataset),
            },
            Err(e) => {
                error!("❌ 数据集 {} 运行失败: {:#}", dataset, e);
                failed.push(dataset);
            }
        }
    }

    if !failed.is_empty() {
        anyhow::bail!("{} 个数据集运行失败: {}", failed.len(), failed.join(", "));
    }
    if cancel.is_cancelled() {
        anyhow::bail!(
            "运行被中断，{} 个数据集未开始: {}",
            not_started.len(),
            not_started.join(", ")
        );
    }
    Ok(())
}

/// 第一次 Ctrl-C 停止提交新题目并保存已有结果，第二次立即退出
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("🛑 收到 Ctrl-C，停止提交新的题目，再按一次立即退出");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            error!("🛑 再次收到 Ctrl-C，立即退出");
            std::process::exit(130);
        }
    });
}

async fn run_dataset(
    config: &Config,
    plan: DatasetPlan,
    clients: Option<Arc<ClientPool>>,
    sink: Arc<dyn ResultSink>,
    cancel: CancellationToken,
) -> Result<RunSummary> {
    log_startup(&plan.source_name, config);

    let adapter = Arc::new(plan.adapter);
    let strategy = match (config.task, clients) {
        (TaskMode::GenerateAnswers, Some(clients)) => {
            TaskStrategy::generate_answers(adapter, clients)
        }
        (TaskMode::GenerateAnswers, None) => anyhow::bail!("生成答案需要模型客户端"),
        (TaskMode::SaveQuestions, _) => TaskStrategy::save_questions(adapter),
    };

    let id_source = match &config.id_field {
        Some(field) => QuestionIdSource::Field(field.clone()),
        None => QuestionIdSource::Position,
    };
    let executor = ItemExecutor::new(Arc::new(strategy)).with_id_source(id_source);

    let pool = WorkerPool::new(
        config.effective_workers(),
        config.item_timeout(),
        config.timeout_mode,
    )
    .with_cancellation_token(cancel);

    let aggregator = PartitionAggregator::new(
        open_source(&plan.source_name, config),
        pool,
        Arc::new(executor),
        Sampler::from_optional_seed(config.seed),
    );

    let suffix = match config.task {
        TaskMode::SaveQuestions => "questions",
        TaskMode::GenerateAnswers if plan.multimodal => config.vision_model.as_str(),
        TaskMode::GenerateAnswers => config.text_model.as_str(),
    };

    let span = info_span!("dataset", name = %plan.output_name);
    let driver = DatasetDriver::new(&plan.output_name, suffix, aggregator, sink, span);
    let summary = driver.run(config.sample_size).await?;
    Ok(summary)
}

fn apply_run_overrides(mut config: Config, args: &RunArgs) -> Config {
    if let Some(n) = args.sample_size {
        config.sample_size = Some(n);
    }
    if let Some(workers) = args.workers {
        config.max_workers = workers;
    }
    if let Some(timeout) = args.timeout {
        config.item_timeout_secs = timeout;
    }
    if let Some(mode) = args.timeout_mode {
        config.timeout_mode = mode;
    }
    if let Some(task) = args.task {
        config.task = task;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(field) = &args.id_field {
        config.id_field = Some(field.clone());
    }
    if let Some(model) = &args.model {
        config.text_model = model.clone();
    }
    if let Some(model) = &args.vision_model {
        config.vision_model = model.clone();
    }
    config
}

/// 内置档案优先，其次是命令行给出的字段
fn plan_dataset(dataset: &str, args: &RunArgs) -> DatasetPlan {
    let profile = DatasetProfile::lookup(dataset)
        .map(|p| (dataset, p))
        .or_else(|| DatasetProfile::find_by_short_name(dataset));

    if let (Some((name, profile)), None) = (profile, &args.question_field) {
        info!("📖 使用内置档案: {} ({})", name, profile.short_name);
        return DatasetPlan {
            source_name: name.to_string(),
            output_name: profile.short_name.to_string(),
            adapter: FieldAdapter::from_profile(profile),
            multimodal: profile.multimodal,
        };
    }

    let mut adapter = FieldAdapter::new(args.question_field.as_deref().unwrap_or("question"));
    if let Some(field) = &args.options_field {
        adapter = adapter.with_options(field);
    }
    if let Some(field) = &args.images_field {
        adapter = adapter.with_images(field);
    }
    if let Some(field) = &args.answer_field {
        adapter = adapter.with_answer(field, AnswerFormat::Raw);
    }

    DatasetPlan {
        source_name: dataset.to_string(),
        output_name: dataset.to_string(),
        adapter,
        multimodal: args.images_field.is_some(),
    }
}

async fn count(config: Config, dataset: &str) -> HarnessResult<()> {
    let name = DatasetProfile::find_by_short_name(dataset)
        .map(|(name, _)| name)
        .unwrap_or(dataset);
    let source = open_source(name, &config);
    let total = count_rows(source.as_ref()).await?;
    info!("📊 {} 共 {} 道题", name, total);
    println!("{}", total);
    Ok(())
}

fn list_datasets() {
    for (name, profile) in DatasetProfile::all() {
        let kind = if profile.multimodal { "图文" } else { "文本" };
        println!("{:<28} {:<14} {}", name, profile.short_name, kind);
    }
}

async fn judge(config: Config, args: JudgeArgs) -> Result<()> {
    let judge = JudgeService::new(&config);
    let verdict = match &args.answer_b {
        Some(answer_b) => {
            judge
                .evaluate_pairwise(&args.question, &args.answer, answer_b, args.rubric.as_deref())
                .await
        }
        None => {
            judge
                .evaluate_pointwise(&args.question, &args.answer, args.rubric.as_deref())
                .await
        }
    }
    .context("评审请求失败")?;
    println!("{}", verdict);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(argv: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Run(args) => args,
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_model_overrides() {
        let args = run_args(&[
            "sopho_bench", "run", "-d", "cais/mmlu", "--model", "qwen2.5", "--vision-model", "llava",
        ]);
        let config = apply_run_overrides(Config::default(), &args);
        assert_eq!(config.text_model, "qwen2.5");
        assert_eq!(config.vision_model, "llava");
        assert!(!args.skip_model_check);

        let args = run_args(&["sopho_bench", "run", "-d", "x", "--skip-model-check"]);
        let config = apply_run_overrides(Config::default(), &args);
        assert_eq!(config.vision_model, Config::default().vision_model);
        assert!(args.skip_model_check);
    }

    #[test]
    fn test_unknown_dataset_plan_uses_field_flags() {
        let args = run_args(&[
            "sopho_bench", "run", "-d", "local.jsonl", "--question-field", "prompt",
            "--images-field", "image",
        ]);
        let plan = plan_dataset("local.jsonl", &args);
        assert_eq!(plan.source_name, "local.jsonl");
        assert!(plan.multimodal);
    }
}
