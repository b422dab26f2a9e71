// ==========================================
// 排课数据同步系统 - 导出文档加载
// ==========================================
// 职责: 将 XML 导出文件解析为可遍历的节点树，丢弃无关分支
// 工具: quick-xml 事件流
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use chrono::{NaiveDate, NaiveTime};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// 导入流程使用的顶层分支，其余分支（假期、值班、考试等）在加载后丢弃
pub const SECTIONS: &[&str] = &[
    "general",
    "departments",
    "descriptions",
    "timeperiods",
    "subjects",
    "classes",
    "teachers",
    "rooms",
    "lessons",
];

// ==========================================
// XmlNode - 元素节点
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

impl XmlNode {
    fn new(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    /// 属性值（去除首尾空白；空值视为缺失）
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(|v| non_empty(v))
    }

    /// 节点 id 属性
    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    /// 节点文本（去除首尾空白；空文本视为缺失）
    pub fn text(&self) -> Option<&str> {
        non_empty(&self.text)
    }

    /// 第一个同名子节点
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// 全部同名子节点（文档顺序）
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// 子节点文本
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(XmlNode::text)
    }

    /// 子节点属性
    pub fn child_attr(&self, child: &str, attr: &str) -> Option<&str> {
        self.child(child).and_then(|c| c.attr(attr))
    }
}

// ==========================================
// Document - 导出文档
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: XmlNode,
}

impl Document {
    /// 从文件加载
    ///
    /// 非 UTF-8 内容按 ISO-8859-1 解码（旧版导出工具的默认编码）
    pub fn load(path: &Path) -> ImportResult<Self> {
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        let bytes = std::fs::read(path)?;
        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %path.display(), "文件不是 UTF-8，按 ISO-8859-1 解码");
                e.into_bytes().iter().map(|&b| char::from(b)).collect()
            }
        };
        info!(path = %path.display(), bytes = content.len(), "导出文件已读取");
        Self::parse(&content)
    }

    /// 解析 XML 文本
    pub fn parse(xml: &str) -> ImportResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        // 栈底为虚拟根节点，收集文档元素
        let mut stack: Vec<XmlNode> = vec![XmlNode::new(String::new())];

        loop {
            let position = reader.buffer_position();
            let event = reader.read_event().map_err(|e| ImportError::XmlParseError {
                position,
                message: e.to_string(),
            })?;

            match event {
                Event::Start(start) => {
                    let node = element_from(&start, position)?;
                    stack.push(node);
                }
                Event::Empty(start) => {
                    let node = element_from(&start, position)?;
                    attach(&mut stack, node)?;
                }
                Event::End(_) => {
                    let node = stack.pop().ok_or_else(|| {
                        ImportError::MalformedDocument("多余的结束标签".to_string())
                    })?;
                    attach(&mut stack, node)?;
                }
                Event::Text(text) => {
                    let value = text.unescape().map_err(|e| ImportError::XmlParseError {
                        position,
                        message: e.to_string(),
                    })?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&value);
                    }
                }
                Event::CData(data) => {
                    let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&value);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if stack.len() != 1 {
            return Err(ImportError::MalformedDocument(format!(
                "{} 个元素未闭合",
                stack.len() - 1
            )));
        }
        let mut top = stack.pop().unwrap_or_default();
        if top.children.len() != 1 {
            return Err(ImportError::MalformedDocument(format!(
                "应有且仅有一个根元素，实际 {} 个",
                top.children.len()
            )));
        }
        let root = top.children.remove(0);
        Ok(Self { root })
    }

    pub fn root(&self) -> &XmlNode {
        &self.root
    }

    /// 丢弃导入流程不使用的顶层分支
    ///
    /// # 返回
    /// - 被丢弃的分支数量
    pub fn strip_unused(&mut self) -> usize {
        let before = self.root.children.len();
        self.root
            .children
            .retain(|c| SECTIONS.contains(&c.name.as_str()));
        let removed = before - self.root.children.len();
        if removed > 0 {
            debug!(removed, "已丢弃无关分支");
        }
        removed
    }

    /// 顶层分支
    pub fn section(&self, name: &str) -> Option<&XmlNode> {
        self.root.child(name)
    }

    /// 顶层分支下的条目（分支缺失时为空）
    pub fn entries<'a>(&'a self, section: &'a str, node: &'a str) -> Vec<&'a XmlNode> {
        self.section(section)
            .map(|s| s.children_named(node).collect())
            .unwrap_or_default()
    }
}

fn element_from(
    start: &quick_xml::events::BytesStart<'_>,
    position: usize,
) -> ImportResult<XmlNode> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut node = XmlNode::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| ImportError::XmlParseError {
            position,
            message: e.to_string(),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| ImportError::XmlParseError {
                position,
                message: e.to_string(),
            })?
            .into_owned();
        node.attributes.insert(key, value);
    }
    Ok(node)
}

fn attach(stack: &mut [XmlNode], node: XmlNode) -> ImportResult<()> {
    let parent = stack
        .last_mut()
        .ok_or_else(|| ImportError::MalformedDocument("多余的结束标签".to_string()))?;
    parent.children.push(node);
    Ok(())
}

// ==========================================
// 导出文件的日期时间格式
// ==========================================

/// 解析 YYYYMMDD
pub fn parse_xml_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y%m%d").ok()
}

/// 解析 HHMM / HHMMSS（小时不足两位时左侧补零，如 800）
pub fn parse_xml_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let padded = match raw.len() {
        3 | 5 => format!("0{}", raw),
        4 | 6 => raw.to_string(),
        _ => return None,
    };
    let (hour, rest) = padded.split_at(2);
    let (minute, second) = rest.split_at(2);
    let second = if second.is_empty() { "0" } else { second };
    NaiveTime::from_hms_opt(hour.parse().ok()?, minute.parse().ok()?, second.parse().ok()?)
}
