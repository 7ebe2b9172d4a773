//! Python module entry point
//!
//! Python widgets are duck-typed: `get_unique_id()`, `render_props()`,
//! `get_children()` and optionally `get_required_css_classes()`; the class name
//! is the widget type. The whole tree is snapshotted into [`WidgetNode`]s before
//! the engine runs, so no Python code executes mid-diff except stub generators.
use crate::converters::{json_to_pyobject, py_dict_to_props, py_to_identity};
use crate::errors::ReconcilerError;
use crate::html_generator::{StubGenerator, StubRegistry, StubRequest};
use crate::types::ReconciliationResult;
use crate::widget::{Widget, WidgetNode};
use crate::{Reconciler, ReconcilerConfig};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

/// Stub generator backed by a Python callable
/// `(widget_type, target_id, props, required_classes) -> str`.
struct PyStubGenerator {
    callable: Py<PyAny>,
}

impl StubGenerator for PyStubGenerator {
    fn generate(&self, request: &StubRequest<'_>) -> Result<String, ReconcilerError> {
        let props = serde_json::to_value(request.props)?;
        Python::attach(|py| {
            let props = json_to_pyobject(py, &props)?;
            self.callable
                .call1(
                    py,
                    (
                        request.widget_type,
                        request.target_id.as_str(),
                        props,
                        request.required_classes.to_vec(),
                    ),
                )?
                .extract::<String>(py)
        })
        .map_err(|e| ReconcilerError::StubGeneration {
            widget_type: request.widget_type.to_string(),
            details: e.to_string(),
        })
    }
}

#[pyclass(name = "Reconciler")]
pub struct PyReconciler {
    inner: Reconciler,
}

#[pymethods]
impl PyReconciler {
    #[new]
    #[pyo3(signature = (config_json=None, html_stubs=true))]
    fn new(config_json: Option<&str>, html_stubs: bool) -> PyResult<Self> {
        let config = match config_json {
            Some(raw) => ReconcilerConfig::from_json_str(raw)?,
            None => ReconcilerConfig::default(),
        };
        let stubs = if html_stubs {
            StubRegistry::html()
        } else {
            StubRegistry::new()
        };
        Ok(PyReconciler {
            inner: Reconciler::with_config(config, stubs)?,
        })
    }

    fn clear_context(&mut self, context_key: &str) {
        self.inner.clear_context(context_key);
    }

    fn clear_all_contexts(&mut self) {
        self.inner.clear_all_contexts();
    }

    fn contexts(&self) -> Vec<String> {
        self.inner.contexts().into_iter().map(String::from).collect()
    }

    fn registry_size(&self, context_key: &str) -> usize {
        self.inner.registry(context_key).len()
    }

    fn register_stub_generator(&mut self, widget_type: String, generator: Py<PyAny>) {
        self.inner
            .stubs_mut()
            .register(widget_type, PyStubGenerator { callable: generator });
    }

    fn set_default_stub_generator(&mut self, generator: Py<PyAny>) {
        self.inner
            .stubs_mut()
            .set_default(PyStubGenerator { callable: generator });
    }

    /// Returns `{"patches", "active_css_classes", "registered_callbacks"}`.
    #[pyo3(signature = (context_key, new_widget_root, parent_html_id))]
    fn reconcile<'py>(
        &mut self,
        py: Python<'py>,
        context_key: &str,
        new_widget_root: Option<Bound<'py, PyAny>>,
        parent_html_id: &str,
    ) -> PyResult<Bound<'py, PyAny>> {
        let root = new_widget_root
            .filter(|w| !w.is_none())
            .map(|w| snapshot_widget(&w))
            .transpose()?;

        let result = self.inner.reconcile(
            context_key,
            root.as_ref().map(|r| r as &dyn Widget),
            parent_html_id,
        )?;
        result_to_python(py, &result)
    }
}

fn snapshot_widget(widget: &Bound<'_, PyAny>) -> Result<WidgetNode, ReconcilerError> {
    let identity = py_to_identity(&widget.call_method0("get_unique_id")?)?;
    let widget_type = widget.get_type().name()?.to_string();

    let props_any = widget.call_method0("render_props")?;
    let props = props_any
        .cast::<PyDict>()
        .map_err(|e| ReconcilerError::TypeConversionError {
            expected: format!("dict from {}.render_props()", widget_type),
            actual: e.to_string(),
        })?;

    let mut node = WidgetNode::identified(widget_type, identity);
    *node.props_mut() = py_dict_to_props(props)?;

    if widget.hasattr("get_required_css_classes")? {
        for class in widget.call_method0("get_required_css_classes")?.try_iter()? {
            node = node.css_class(class?.extract::<String>()?);
        }
    }

    for child in widget.call_method0("get_children")?.try_iter()? {
        node = node.child(snapshot_widget(&child?)?);
    }
    Ok(node)
}

fn result_to_python<'py>(
    py: Python<'py>,
    result: &ReconciliationResult,
) -> PyResult<Bound<'py, PyAny>> {
    let out = PyDict::new(py);

    let patches = PyList::empty(py);
    for patch in &result.patches {
        let patch_dict = PyDict::new(py);
        patch_dict.set_item("action", patch.action.to_string())?;
        patch_dict.set_item("target_id", patch.target_id.as_str())?;
        patch_dict.set_item("data", json_to_pyobject(py, &patch.data)?)?;
        patches.append(patch_dict)?;
    }
    out.set_item("patches", patches)?;

    let css_classes = PyDict::new(py);
    for (class, widget_type) in &result.active_css_classes {
        css_classes.set_item(class, widget_type)?;
    }
    out.set_item("active_css_classes", css_classes)?;

    let callbacks = PyDict::new(py);
    for (name, binding) in &result.registered_callbacks {
        callbacks.set_item(name, (binding.target_id.as_str(), binding.event.as_str()))?;
    }
    out.set_item("registered_callbacks", callbacks)?;

    Ok(out.into_any())
}

#[pymodule]
fn keyed_reconciler(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyReconciler>()?;

    // Export patch actions as constants
    m.add("INSERT", "INSERT")?;
    m.add("REMOVE", "REMOVE")?;
    m.add("UPDATE", "UPDATE")?;
    m.add("MOVE", "MOVE")?;

    Ok(())
}
