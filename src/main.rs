use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use epubmark::{Conversion, ConvertOptions, OutputMode, Result, convert_file, logging, package};

/// 📚 epubmark - EPUB转Markdown工具
#[derive(Parser)]
#[command(name = "epubmark")]
#[command(about = "把EPUB电子书转换为Markdown")]
#[command(version)]
struct Args {
    /// EPUB文件路径
    #[arg(help = "要转换的EPUB文件路径")]
    epub_file: PathBuf,

    /// 输出目录
    #[arg(short, long, default_value = "output", help = "输出目录")]
    output: PathBuf,

    /// 多文件模式
    #[arg(short, long = "multiple-files", help = "每章输出一个Markdown文件，外加一个索引文件")]
    multiple_files: bool,

    /// 提取图片（只支持多文件模式）
    #[arg(short = 'i', long, help = "提取并压缩图片（需要同时使用 --multiple-files）")]
    extract_images: bool,

    /// YAML配置文件
    #[arg(long, help = "YAML配置文件，命令行参数会覆盖其中的值")]
    config: Option<PathBuf>,

    /// 不打包为ZIP
    #[arg(long, help = "直接写入输出目录而不是生成ZIP文件")]
    no_zip: bool,

    /// 工作线程数
    #[arg(short = 'j', long, help = "并行处理使用的线程数（默认由CPU核数决定）")]
    workers: Option<usize>,

    /// 详细输出模式
    #[arg(short, long, help = "显示调试日志")]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = logging::init(args.verbose) {
        eprintln!("⚠️  {}", e);
    }

    println!("📚 epubmark - EPUB转Markdown工具");

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ 错误: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let options = build_options(args)?;

    println!("正在转换: {}", args.epub_file.display());
    let conversion = convert_file(&args.epub_file, &options)?;
    print_summary(&conversion);

    let path = package::write_output(&conversion, &args.output, !args.no_zip)?;
    println!("🎉 转换完成: {}", path.display());
    Ok(())
}

/// 配置文件的值在前，命令行参数覆盖
fn build_options(args: &Args) -> Result<ConvertOptions> {
    let mut options = match &args.config {
        Some(path) => ConvertOptions::from_file(path)?,
        None => ConvertOptions::default(),
    };

    if args.multiple_files {
        options.mode = OutputMode::MultiFile;
    }
    if args.extract_images {
        options.extract_images = true;
    }
    if args.workers.is_some() {
        options.workers = args.workers;
    }

    Ok(options)
}

fn print_summary(conversion: &Conversion) {
    println!("\n📖 书名: {}", conversion.metadata.title);
    if !conversion.metadata.authors.is_empty() {
        println!("✍️  作者: {}", conversion.metadata.authors.join(", "));
    }
    println!("📑 章节: {} 个", conversion.chapters.len());
    println!("📝 Markdown文件: {} 个", conversion.markdown.len());
    if !conversion.images.is_empty() {
        println!("🖼️  图片: {} 张", conversion.images.len());
    }

    if !conversion.warnings.is_empty() {
        println!("\n⚠️  警告 ({} 个):", conversion.warnings.len());
        for (i, warning) in conversion.warnings.iter().enumerate() {
            println!("  {}. {}", i + 1, warning);
        }
    }
}
