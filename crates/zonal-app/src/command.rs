//! 命令行解析
//!
//! 完整命令和短命令都不区分大小写，例如 `list` / `ls`、`delete` / `rm`。

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use std::path::PathBuf;
use zonal_core::kind::ZoneKind;
use zonal_core::math::{BoundingBox2, Point2};
use zonal_core::schema::{FieldValue, ZonePatch};
use zonal_core::zone::ZoneId;

pub const USAGE: &str = "\
usage: zonal [--root DIR] [--scene NAME] [--config FILE] [--verbose] <command>

commands:
  list | ls                          列出场景内的区域
  scenes                             列出根目录下的所有场景
  add | a KIND [--name N] X,Y ...    创建区域（至少 3 个点）
  query | q X Y                      点击查询并显示局部环境
  select | sel X Y W H               框选查询
  set ID FIELD=VALUE ...             更新字段（值按 JSON 解析）
  delete | del | rm ID ...           删除区域
  export FILE                        导出为 JSON
  import FILE                        从 JSON 导入
  help | -h | --help                 显示本帮助";

/// 全局选项
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub root: Option<PathBuf>,
    pub scene: String,
    pub config: Option<PathBuf>,
    pub verbose: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            root: None,
            scene: "default".to_string(),
            config: None,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    List,
    Scenes,
    Add {
        kind: ZoneKind,
        name: Option<String>,
        points: Vec<Point2>,
    },
    Query {
        point: Point2,
    },
    Select {
        rect: BoundingBox2,
    },
    Set {
        patch: ZonePatch,
    },
    Delete {
        ids: Vec<ZoneId>,
    },
    Export {
        path: PathBuf,
    },
    Import {
        path: PathBuf,
    },
    Help,
}

/// 解析参数（不含程序名）
pub fn parse(args: impl IntoIterator<Item = String>) -> Result<(Options, Command)> {
    let mut options = Options::default();
    let mut args = args.into_iter();
    let mut rest = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--root" => options.root = Some(PathBuf::from(value_of(&mut args, "--root")?)),
            "--scene" => options.scene = value_of(&mut args, "--scene")?,
            "--config" => options.config = Some(PathBuf::from(value_of(&mut args, "--config")?)),
            "--verbose" | "-v" => options.verbose = true,
            _ => {
                rest.push(arg);
                rest.extend(args.by_ref());
            }
        }
    }

    let Some((name, operands)) = rest.split_first() else {
        return Ok((options, Command::Help));
    };
    let command = match name.to_uppercase().as_str() {
        "LIST" | "LS" => Command::List,
        "SCENES" => Command::Scenes,
        "ADD" | "A" => parse_add(operands)?,
        "QUERY" | "Q" => match operands {
            [x, y] => Command::Query {
                point: Point2::new(number(x)?, number(y)?),
            },
            _ => bail!("query expects X Y"),
        },
        "SELECT" | "SEL" => match operands {
            [x, y, w, h] => Command::Select {
                rect: BoundingBox2::from_rect(number(x)?, number(y)?, number(w)?, number(h)?),
            },
            _ => bail!("select expects X Y W H"),
        },
        "SET" => parse_set(operands)?,
        "DELETE" | "DEL" | "RM" => {
            if operands.is_empty() {
                bail!("delete expects at least one id");
            }
            Command::Delete {
                ids: operands.iter().map(|s| zone_id(s)).collect::<Result<_>>()?,
            }
        }
        "EXPORT" => Command::Export {
            path: single_path(operands, "export")?,
        },
        "IMPORT" => Command::Import {
            path: single_path(operands, "import")?,
        },
        "HELP" | "-H" | "--HELP" => Command::Help,
        other => bail!("unknown command '{}'", other.to_lowercase()),
    };
    Ok((options, command))
}

fn value_of(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next().ok_or_else(|| anyhow!("{} needs a value", flag))
}

fn number(s: &str) -> Result<f64> {
    s.parse::<f64>().with_context(|| format!("'{}' is not a number", s))
}

fn point(s: &str) -> Result<Point2> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| anyhow!("point '{}' must look like X,Y", s))?;
    Ok(Point2::new(number(x.trim())?, number(y.trim())?))
}

fn zone_id(s: &str) -> Result<ZoneId> {
    serde_json::from_value(Value::String(s.to_string()))
        .with_context(|| format!("'{}' is not a zone id", s))
}

fn single_path(operands: &[String], command: &str) -> Result<PathBuf> {
    match operands {
        [path] => Ok(PathBuf::from(path)),
        _ => bail!("{} expects exactly one file", command),
    }
}

fn parse_add(operands: &[String]) -> Result<Command> {
    let Some((kind, rest)) = operands.split_first() else {
        bail!("add expects a kind and at least 3 points");
    };
    let kind: ZoneKind = kind.parse().map_err(|e: String| anyhow!(e))?;

    let mut name = None;
    let mut points = Vec::new();
    let mut rest = rest.iter();
    while let Some(arg) = rest.next() {
        if arg == "--name" {
            name = Some(rest.next().ok_or_else(|| anyhow!("--name needs a value"))?.clone());
        } else {
            points.push(point(arg)?);
        }
    }
    if points.len() < 3 {
        bail!("a zone needs at least 3 points, got {}", points.len());
    }
    Ok(Command::Add { kind, name, points })
}

fn parse_set(operands: &[String]) -> Result<Command> {
    let Some((id, assignments)) = operands.split_first() else {
        bail!("set expects an id and FIELD=VALUE pairs");
    };
    let mut patch = ZonePatch::new(zone_id(id)?);
    for assignment in assignments {
        let (field, raw) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow!("'{}' must look like FIELD=VALUE", assignment))?;
        // 不是合法 JSON 的值按字符串处理
        let value = serde_json::from_str::<Value>(raw)
            .unwrap_or_else(|_| Value::String(raw.to_string()));
        patch
            .fields
            .insert(field.to_string(), FieldValue::from_json(field, &value)?);
    }
    if patch.is_empty() {
        bail!("set expects at least one FIELD=VALUE pair");
    }
    Ok(Command::Set { patch })
}
