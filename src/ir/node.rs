use std::ops::Deref;

use paste::paste;

use crate::builder::system::RtlBuilder;
use crate::ir::*;

/// Anything stored in the builder's slab. The slab key together with the
/// kind tag forms the node's identity for the whole elaboration.
pub trait IsElement<'elem, 'sys: 'elem> {
  fn upcast(&self) -> BaseNode;
  fn set_key(&mut self, key: usize);
  fn get_key(&self) -> usize;
  fn into_reference(key: usize) -> BaseNode;
  fn downcast(slab: &'sys slab::Slab<Element>, node: &BaseNode) -> Result<&'elem Self, String>;
  fn downcast_mut(
    slab: &'sys mut slab::Slab<Element>,
    node: &BaseNode,
  ) -> Result<&'elem mut Box<Self>, String>;
}

pub trait Referencable<'elem, 'sys: 'elem, T: IsElement<'elem, 'sys>> {
  type Reference;
  fn reference(sys: &'sys RtlBuilder, elem: BaseNode) -> Result<Self::Reference, String>;
}

macro_rules! emit_elem_impl {
  ($name:ident) => {
    paste! {

      impl From<$name> for Element {
        fn from(x: $name) -> Element {
          Element::$name(Box::new(x))
        }
      }

      impl<'elem, 'sys: 'elem> IsElement<'elem, 'sys> for $name {
        fn set_key(&mut self, key: usize) {
          self.key = key;
        }

        fn get_key(&self) -> usize {
          self.key
        }

        fn upcast(&self) -> BaseNode {
          BaseNode::new(NodeKind::$name, self.key)
        }

        fn into_reference(key: usize) -> BaseNode {
          BaseNode::new(NodeKind::$name, key)
        }

        fn downcast(
          slab: &'sys slab::Slab<Element>,
          node: &BaseNode,
        ) -> Result<&'elem $name, String> {
          if let NodeKind::$name = node.get_kind() {
            let key = node.get_key();
            let x = slab.get(key).unwrap_or_else(|| {
              panic!(
                "Invalid slab entry @{} for {}, did you use a node outside its elaboration?",
                key,
                stringify!($name)
              )
            });
            if let Element::$name(res) = x {
              return Ok(res);
            }
          }
          Err(format!(
            "IsElement::downcast: expecting {}, but {:?}",
            stringify!($name),
            node,
          ))
        }

        fn downcast_mut(
          slab: &'sys mut slab::Slab<Element>,
          node: &BaseNode,
        ) -> Result<&'elem mut Box<$name>, String> {
          if let NodeKind::$name = node.get_kind() {
            let key = node.get_key();
            let x = slab.get_mut(key).unwrap_or_else(|| {
              panic!(
                "Invalid slab entry @{} for {}, did you use a node outside its elaboration?",
                key,
                stringify!($name)
              )
            });
            if let Element::$name(res) = x {
              return Ok(res);
            }
          }
          Err(format!(
            "IsElement::downcast: expecting {}, but {:?}({})",
            stringify!($name),
            node.get_kind(),
            node.get_key()
          ))
        }
      }

      #[derive(Clone)]
      pub struct [<$name Ref>] <'a> {
        pub(crate) sys: &'a RtlBuilder,
        pub(crate) elem: BaseNode,
      }

      impl<'sys> [<$name Ref>] <'sys> {
        pub fn get<'borrow, 'res>(&'borrow self) -> &'res $name
        where
          'sys: 'borrow,
          'sys: 'res,
          'borrow: 'res,
        {
          <$name>::downcast(&self.sys.slab, &self.elem).unwrap()
        }

        pub fn upcast(&self) -> BaseNode {
          self.elem
        }
      }

      impl Deref for [<$name Ref>]<'_> {
        type Target = $name;

        fn deref(&self) -> &Self::Target {
          self.get()
        }
      }

      impl<'elem, 'sys: 'elem> Referencable<'elem, 'sys, $name> for $name {
        type Reference = [<$name Ref>]<'sys>;

        fn reference(sys: &'sys RtlBuilder, elem: BaseNode) -> Result<Self::Reference, String> {
          if let NodeKind::$name = elem.get_kind() {
            Ok([<$name Ref>] { sys, elem })
          } else {
            Err(format!(
              "Expecting {}, but {:?} is given",
              stringify!($name),
              elem
            ))
          }
        }
      }
    }
  };
}

macro_rules! register_elements {
  ($($to_register:ident),* $(,)?) => {
    $( emit_elem_impl!($to_register); )*

    #[derive(Clone, Debug, Eq, PartialEq, Hash, Copy)]
    pub enum NodeKind {
      $($to_register,)*
      Unknown,
    }

    pub enum Element {
      $($to_register(Box<$to_register>),)*
    }
  };
}

register_elements!(Expr, Var);

#[derive(Clone, Debug, Eq, PartialEq, Hash, Copy)]
pub struct BaseNode {
  kind: NodeKind,
  key: usize,
}

impl BaseNode {
  pub fn new(kind: NodeKind, key: usize) -> Self {
    Self { kind, key }
  }

  pub fn unknown() -> Self {
    Self::new(NodeKind::Unknown, 0)
  }

  pub fn get_key(&self) -> usize {
    self.key
  }

  pub fn get_kind(&self) -> NodeKind {
    self.kind
  }

  pub fn is_unknown(&self) -> bool {
    self.kind == NodeKind::Unknown
  }

  pub fn get_dtype(&self, sys: &RtlBuilder) -> Option<DataType> {
    match self.kind {
      NodeKind::Expr => {
        let expr = self.as_ref::<Expr>(sys).unwrap();
        expr.dtype().clone().into()
      }
      NodeKind::Var => {
        let var = self.as_ref::<Var>(sys).unwrap();
        var.dtype().clone().into()
      }
      NodeKind::Unknown => None,
    }
  }

  /// The bit width of this node's value. Panics on a node without one.
  pub fn width(&self, sys: &RtlBuilder) -> usize {
    self
      .get_dtype(sys)
      .unwrap_or_else(|| panic!("{:?} has no data type", self))
      .get_bits()
  }

  pub fn as_ref<'elem, 'sys: 'elem, T: IsElement<'elem, 'sys> + Referencable<'elem, 'sys, T>>(
    &self,
    sys: &'sys RtlBuilder,
  ) -> Result<T::Reference, String> {
    T::reference(sys, *self)
  }

  /// If this node is a constant, its value.
  pub fn as_const<'a>(&self, sys: &'a RtlBuilder) -> Option<&'a num_bigint::BigUint> {
    if let Ok(expr) = Expr::downcast(&sys.slab, self) {
      if let Opcode::Const { value } = expr.get_opcode() {
        return Some(value);
      }
    }
    None
  }
}
